//! Remote collaborator traits.
//!
//! The session talks to three remote services through these traits. Each
//! has an HTTP implementation in [`crate::http`] and a deterministic mock in
//! [`crate::mock`]. Implementations make a single attempt per call; retry
//! and cancellation are layered on top by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subsi_core::{ApplicationId, Timestamp};
use subsi_vc::{Attestation, RvoSubmission, SchemeAnalysis, SubmissionDocument, SubmissionStatus, WalletCredential};

use crate::error::RemoteError;

/// Supplies the wallet credentials of an application's applicant.
#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn fetch_credentials(&self, application_id: ApplicationId) -> Result<Vec<WalletCredential>, RemoteError>;

    fn source_name(&self) -> &'static str;
}

/// Analyses a subsidy scheme's public pages into requirements.
#[async_trait]
pub trait RequirementsSource: Send + Sync {
    async fn analyze(&self, scheme_url: &str) -> Result<SchemeAnalysis, RemoteError>;

    fn source_name(&self) -> &'static str;
}

/// The RVO submission gateway.
///
/// The gateway's answer is authoritative: `submit` only returns `Ok` when
/// the gateway explicitly reports the application as submitted.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<RvoSubmission, RemoteError>;

    async fn fetch_status(&self, reference: &str) -> Result<StatusReport, RemoteError>;

    fn gateway_name(&self) -> &'static str;
}

/// Body of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub application_id: ApplicationId,
    pub attestation: Attestation,
    #[serde(default)]
    pub documents: Vec<SubmissionDocument>,
}

/// Status of a submission as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub reference: String,
    pub status: SubmissionStatus,
    /// Gateway's reason, passed through verbatim. Usually set on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub last_updated: Timestamp,
}
