//! # RVO Submission Record
//!
//! What the submission gateway returns for an accepted application, and the
//! only status change it may later report: `submitted → approved|rejected`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use subsi_core::Timestamp;

use crate::attestation::Attestation;

/// Lifecycle of a submission as reported by RVO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Submitted,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("submission status cannot change from {from} to {to}")]
pub struct StatusChangeError {
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
}

/// A document sent along with the attestation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDocument {
    pub name: String,
    pub media_type: String,
    #[serde(default)]
    pub content: Value,
}

/// An application accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RvoSubmission {
    /// Gateway reference, e.g. `RVO-8D4C0F5E`.
    pub reference: String,
    pub attestation: Attestation,
    #[serde(default)]
    pub documents: Vec<SubmissionDocument>,
    pub submitted_at: Timestamp,
    pub status: SubmissionStatus,
}

impl RvoSubmission {
    /// Apply an observed status.
    ///
    /// Returns `Ok(true)` if the status changed, `Ok(false)` if `observed`
    /// equals the current status.
    pub fn observe(&mut self, observed: SubmissionStatus) -> Result<bool, StatusChangeError> {
        if observed == self.status {
            return Ok(false);
        }
        if self.status != SubmissionStatus::Submitted || observed == SubmissionStatus::Submitted {
            return Err(StatusChangeError {
                from: self.status,
                to: observed,
            });
        }
        self.status = observed;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{AttestationProof, AttestationSubject};
    use std::collections::BTreeMap;
    use subsi_core::ApplicationId;

    fn submission() -> RvoSubmission {
        RvoSubmission {
            reference: "RVO-8D4C0F5E".into(),
            attestation: Attestation {
                id: "urn:sha256:00".into(),
                attestation_type: "DhiSubsidyApplication".into(),
                issuer: "EntrepreneurAI".into(),
                issued_at: Timestamp::now(),
                credential_subject: AttestationSubject {
                    wallet_credentials: vec![],
                    additional_information: BTreeMap::new(),
                    application_id: ApplicationId::new(),
                },
                proof: AttestationProof {
                    proof_type: "JwtProof2020".into(),
                    jwt: "a.b.c".into(),
                },
            },
            documents: vec![],
            submitted_at: Timestamp::now(),
            status: SubmissionStatus::Submitted,
        }
    }

    #[test]
    fn submitted_moves_to_terminal_once() {
        let mut s = submission();
        assert_eq!(s.observe(SubmissionStatus::Submitted), Ok(false));
        assert_eq!(s.observe(SubmissionStatus::Approved), Ok(true));
        assert_eq!(s.observe(SubmissionStatus::Approved), Ok(false));
        assert!(s.observe(SubmissionStatus::Rejected).is_err());
        assert!(s.observe(SubmissionStatus::Submitted).is_err());
        assert_eq!(s.status, SubmissionStatus::Approved);
    }
}
