//! # Application Attestation
//!
//! The signed statement submitted to RVO: the applicant's wallet
//! credentials and additional information, bound to one application id.
//!
//! ## Identity
//!
//! The attestation `id` is `urn:sha256:<hex>` over the JCS-canonical
//! `credentialSubject`. Two attestations over the same logical content have
//! the same id regardless of map construction order or timestamp precision.
//!
//! ## Proof
//!
//! `proof.jwt` is produced by a [`SigningCapability`]. Signing may be
//! remote (a wallet or HSM), so the trait is async. [`Ed25519JwsSigner`] is
//! the local implementation: an EdDSA compact JWS whose claims bind the
//! issuer, the attestation id and the subject digest.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use subsi_core::{
    sha256_digest, ApplicationId, CanonicalBytes, CanonicalizationError, ContentDigest, CryptoError,
    FieldId, Timestamp,
};
use subsi_crypto::{sign_jws, verify_jws, Ed25519KeyPair, Ed25519PublicKey, JwsClaims};

use crate::credential::WalletCredential;

/// `type` of every application attestation.
pub const ATTESTATION_TYPE: &str = "DhiSubsidyApplication";
/// `proof.type` for JWS-backed proofs.
pub const PROOF_TYPE: &str = "JwtProof2020";
/// Issuer used when none is configured.
pub const DEFAULT_ISSUER: &str = "EntrepreneurAI";

/// Errors from building, signing or verifying attestations.
#[derive(Error, Debug)]
pub enum AttestationError {
    /// The draft still has missing fields or is not in `complete` status.
    #[error("draft is not complete: {missing} field(s) still missing")]
    DraftIncomplete { missing: usize },

    /// The signing capability failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The proof does not match the attestation.
    #[error("attestation verification failed: {0}")]
    Verification(String),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

// ─── Attestation ─────────────────────────────────────────────────────

/// The attested content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationSubject {
    pub wallet_credentials: Vec<WalletCredential>,
    pub additional_information: BTreeMap<FieldId, Value>,
    pub application_id: ApplicationId,
}

impl AttestationSubject {
    /// SHA-256 over the canonical encoding of this subject.
    pub fn digest(&self) -> Result<ContentDigest, AttestationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationProof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub jwt: String,
}

/// A signed application attestation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    #[serde(rename = "type")]
    pub attestation_type: String,
    pub issuer: String,
    pub issued_at: Timestamp,
    pub credential_subject: AttestationSubject,
    pub proof: AttestationProof,
}

impl Attestation {
    /// The application this attestation references.
    pub fn application_id(&self) -> ApplicationId {
        self.credential_subject.application_id
    }

    /// Check that the id matches the subject and that the proof verifies
    /// under `public_key` and binds this id, issuer and subject digest.
    pub fn verify(&self, public_key: &Ed25519PublicKey) -> Result<(), AttestationError> {
        let digest = self.credential_subject.digest()?;
        if self.id != digest.to_urn() {
            return Err(AttestationError::Verification(format!(
                "id {} does not match subject digest {}",
                self.id,
                digest.to_urn()
            )));
        }
        let claims = verify_jws(&self.proof.jwt, public_key)?;
        if claims.sub != self.id || claims.digest != digest.to_hex() || claims.iss != self.issuer {
            return Err(AttestationError::Verification(
                "proof claims do not bind this attestation".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Signing ─────────────────────────────────────────────────────────

/// What a signer is asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub attestation_id: String,
    pub issuer: String,
    pub issued_at: Timestamp,
    pub subject_digest: ContentDigest,
}

/// External capability producing `proof.jwt` for an attestation.
#[async_trait]
pub trait SigningCapability: Send + Sync {
    async fn sign(&self, request: &SigningRequest) -> Result<String, AttestationError>;
}

/// Local EdDSA JWS signer.
#[derive(Debug)]
pub struct Ed25519JwsSigner {
    key: Ed25519KeyPair,
    kid: Option<String>,
}

impl Ed25519JwsSigner {
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self { key, kid: None }
    }

    /// Set the `kid` header, typically a DID verification method.
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.key.public_key()
    }
}

#[async_trait]
impl SigningCapability for Ed25519JwsSigner {
    async fn sign(&self, request: &SigningRequest) -> Result<String, AttestationError> {
        let claims = JwsClaims {
            iss: request.issuer.clone(),
            sub: request.attestation_id.clone(),
            iat: request.issued_at.epoch_secs(),
            digest: request.subject_digest.to_hex(),
        };
        Ok(sign_jws(&self.key, self.kid.clone(), &claims)?)
    }
}
