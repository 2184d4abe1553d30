//! # Application State
//!
//! Shared by every handler through the `State` extractor:
//! - the session registry, one entry per application id;
//! - the remote collaborators and their retry policy;
//! - the attestation signer and builder;
//! - the verifier applicants confirm attestations with.
//!
//! The registry lock is synchronous and never held across an `.await`.
//! Each session has its own async mutex; see [`crate::session`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use subsi_client::RemoteServices;
use subsi_core::ApplicationId;
use subsi_crypto::Ed25519KeyPair;
use subsi_state::AttestationBuilder;
use subsi_vc::{ApplicantVerifier, Ed25519JwsSigner, PinVerifier, SigningCapability, DEMO_CONFIRMATION_PIN};

use crate::config::{ApiConfig, ApiConfigError};
use crate::session::{ApplicationSession, SharedSession};

/// Live sessions keyed by application id.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<ApplicationId, SharedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: ApplicationSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        self.sessions.write().insert(id, Arc::clone(&shared));
        shared
    }

    pub fn get(&self, id: &ApplicationId) -> Option<SharedSession> {
        self.sessions.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub services: RemoteServices,
    pub signer: Arc<dyn SigningCapability>,
    pub builder: AttestationBuilder,
    pub verifier: Arc<dyn ApplicantVerifier>,
    pub config: Arc<ApiConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .field("services", &self.services)
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    /// Build state from configuration. Without a configured seed the
    /// signer key is generated and lives only as long as the process.
    pub fn new(config: ApiConfig, services: RemoteServices) -> Result<Self, ApiConfigError> {
        let key = match &config.signing_seed {
            Some(seed) => Ed25519KeyPair::from_seed_hex(seed)
                .map_err(|e| ApiConfigError::InvalidSeed(e.to_string()))?,
            None => {
                tracing::warn!("SUBSI_SIGNING_SEED not set; attestations are signed with an ephemeral key");
                Ed25519KeyPair::generate()
            }
        };
        if config.confirmation_pin.is_none() {
            tracing::warn!("SUBSI_CONFIRMATION_PIN not set; attestations are confirmed with the demo PIN");
        }
        let signer = Ed25519JwsSigner::new(key).with_kid(config.issuer.clone());
        Ok(Self::with_signer(config, services, Arc::new(signer)))
    }

    pub fn with_signer(config: ApiConfig, services: RemoteServices, signer: Arc<dyn SigningCapability>) -> Self {
        let pin = config
            .confirmation_pin
            .clone()
            .unwrap_or_else(|| DEMO_CONFIRMATION_PIN.to_string());
        Self {
            sessions: SessionRegistry::new(),
            builder: AttestationBuilder::new(config.issuer.clone()),
            verifier: Arc::new(PinVerifier::new(pin)),
            services,
            signer,
            config: Arc::new(config),
        }
    }
}
