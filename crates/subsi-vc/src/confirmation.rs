//! # Attestation Confirmation
//!
//! The applicant confirms a built attestation in their wallet (PIN or
//! biometric) before it may be submitted. [`ApplicantVerifier`] is the
//! seam for that check; [`PinVerifier`] compares against a configured PIN.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use subsi_core::Timestamp;

use crate::attestation::Attestation;

/// PIN accepted by the demo wallet.
pub const DEMO_CONFIRMATION_PIN: &str = "1234";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationError {
    /// The applicant's proof did not verify.
    #[error("confirmation refused: {0}")]
    Refused(String),

    /// The verifier could not be reached.
    #[error("confirmation unavailable: {0}")]
    Unavailable(String),
}

/// What the applicant presents to confirm. `Debug` redacts the PIN.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationProof {
    pub pin: String,
}

impl std::fmt::Debug for ConfirmationProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationProof").field("pin", &"[REDACTED]").finish()
    }
}

/// Record of a confirmed attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationConfirmation {
    pub attestation_id: String,
    pub method: String,
    pub confirmed_at: Timestamp,
}

/// Checks that the applicant consents to an attestation.
#[async_trait]
pub trait ApplicantVerifier: Send + Sync {
    async fn verify(
        &self,
        attestation: &Attestation,
        proof: &ConfirmationProof,
    ) -> Result<AttestationConfirmation, ConfirmationError>;
}

pub struct PinVerifier {
    pin: String,
}

impl std::fmt::Debug for PinVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinVerifier").field("pin", &"[REDACTED]").finish()
    }
}

impl PinVerifier {
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }

    fn matches(&self, provided: &str) -> bool {
        let expected = self.pin.as_bytes();
        let provided = provided.as_bytes();
        if provided.len() != expected.len() {
            let _ = expected.ct_eq(expected);
            return false;
        }
        provided.ct_eq(expected).into()
    }
}

#[async_trait]
impl ApplicantVerifier for PinVerifier {
    async fn verify(
        &self,
        attestation: &Attestation,
        proof: &ConfirmationProof,
    ) -> Result<AttestationConfirmation, ConfirmationError> {
        if !self.matches(&proof.pin) {
            return Err(ConfirmationError::Refused("invalid PIN".into()));
        }
        Ok(AttestationConfirmation {
            attestation_id: attestation.id.clone(),
            method: "pin".into(),
            confirmed_at: Timestamp::now(),
        })
    }
}
