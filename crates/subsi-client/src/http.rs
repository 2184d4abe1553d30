//! HTTP implementations of the remote collaborator traits.
//!
//! Endpoints:
//! - `GET  {wallet}/api/v1/wallet/credentials?applicationId=…`
//! - `POST {analysis}/api/v1/analyze`
//! - `POST {rvo}/api/v1/submissions`
//! - `GET  {rvo}/api/v1/submissions/{reference}/status`
//!
//! Transport errors, timeouts, 5xx and 429 map to
//! [`RemoteError::Unavailable`]; other non-success statuses map to
//! [`RemoteError::Rejected`] with the body's reason; undecodable bodies map
//! to [`RemoteError::InvalidResponse`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use subsi_core::{ApplicationId, Timestamp};
use subsi_vc::{import_wallet_export, RvoSubmission, SchemeAnalysis, SubmissionStatus, WalletCredential};
use url::Url;

use crate::adapter::{RequirementsSource, StatusReport, SubmissionGateway, SubmissionRequest, WalletSource};
use crate::config::{ClientConfig, ConfigError};
use crate::error::RemoteError;

fn build_http(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    let mut headers = reqwest::header::HeaderMap::new();
    let auth = format!("Bearer {}", config.api_token);
    let value = reqwest::header::HeaderValue::from_str(&auth)
        .map_err(|e| ConfigError::InvalidUrl("SUBSI_API_TOKEN".into(), e.to_string()))?;
    headers.insert(reqwest::header::AUTHORIZATION, value);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ConfigError::InvalidUrl("http client".into(), e.to_string()))
}

fn join(base: &Url, path: &str) -> Result<Url, RemoteError> {
    base.join(path).map_err(|e| RemoteError::InvalidResponse {
        endpoint: path.to_string(),
        message: format!("cannot build URL: {e}"),
    })
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> RemoteError {
    let message = if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    };
    RemoteError::unavailable(endpoint, message)
}

/// Classify a response by status, then decode its body.
async fn read_json<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error(endpoint, status, &body));
    }
    resp.json().await.map_err(|e| RemoteError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn status_error(endpoint: &str, status: StatusCode, body: &str) -> RemoteError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return RemoteError::unavailable(endpoint, format!("HTTP {status}: {body}"));
    }
    RemoteError::Rejected {
        endpoint: endpoint.to_string(),
        reason: rejection_reason(status, body),
    }
}

/// `error.message`, `message` or `reason` from a JSON body, else the raw
/// body, else the status text.
fn rejection_reason(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let found = json
            .pointer("/error/message")
            .or_else(|| json.get("message"))
            .or_else(|| json.get("reason"))
            .and_then(Value::as_str);
        if let Some(reason) = found {
            return reason.to_string();
        }
    }
    if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("rejected").to_string()
    } else {
        body.trim().to_string()
    }
}

// ─── Wallet ─────────────────────────────────────────────────────────

/// Wallet service client.
///
/// Accepts either `{"credentials": [...]}` with typed credentials or a
/// display-oriented wallet export `{"content": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpWalletSource {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpWalletSource {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http(config)?,
            base_url: config.wallet_url.clone(),
        })
    }
}

#[async_trait]
impl WalletSource for HttpWalletSource {
    async fn fetch_credentials(&self, application_id: ApplicationId) -> Result<Vec<WalletCredential>, RemoteError> {
        let endpoint = "GET /api/v1/wallet/credentials";
        let mut url = join(&self.base_url, "api/v1/wallet/credentials")?;
        url.query_pairs_mut()
            .append_pair("applicationId", &application_id.to_string());

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;
        let body: Value = read_json(endpoint, resp).await?;

        if let Some(entries) = body.get("credentials").and_then(Value::as_array) {
            let credentials = entries
                .iter()
                .cloned()
                .map(WalletCredential::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(%application_id, count = credentials.len(), "wallet credentials fetched");
            return Ok(credentials);
        }
        if body.get("content").is_some() {
            let credentials = import_wallet_export(&body, Timestamp::now())?;
            tracing::debug!(%application_id, count = credentials.len(), "wallet export imported");
            return Ok(credentials);
        }
        Err(RemoteError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: "expected a credentials or content array".to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "wallet-http"
    }
}

// ─── Scheme analysis ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpRequirementsSource {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRequirementsSource {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http(config)?,
            base_url: config.analysis_url.clone(),
        })
    }
}

#[async_trait]
impl RequirementsSource for HttpRequirementsSource {
    async fn analyze(&self, scheme_url: &str) -> Result<SchemeAnalysis, RemoteError> {
        let endpoint = "POST /api/v1/analyze";
        let url = join(&self.base_url, "api/v1/analyze")?;
        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({ "url": scheme_url }))
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;
        let analysis: SchemeAnalysis = read_json(endpoint, resp).await?;
        tracing::debug!(
            scheme = %analysis.url,
            attestations = analysis.attestations.len(),
            "scheme analysed"
        );
        Ok(analysis)
    }

    fn source_name(&self) -> &'static str {
        "analysis-http"
    }
}

// ─── RVO gateway ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    reference: Option<String>,
    status: String,
    #[serde(default)]
    submitted_at: Option<Timestamp>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    #[serde(default)]
    reference: Option<String>,
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    last_updated: Option<Timestamp>,
}

/// Map a gateway status string. Intermediate review states count as
/// `submitted`.
fn parse_status(raw: &str) -> Option<SubmissionStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "submitted" | "received" | "under_review" => Some(SubmissionStatus::Submitted),
        "approved" => Some(SubmissionStatus::Approved),
        "rejected" => Some(SubmissionStatus::Rejected),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct HttpSubmissionGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpSubmissionGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http: build_http(config)?,
            base_url: config.rvo_url.clone(),
        })
    }
}

#[async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<RvoSubmission, RemoteError> {
        let endpoint = "POST /api/v1/submissions";
        let url = join(&self.base_url, "api/v1/submissions")?;
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;
        let body: SubmitResponse = read_json(endpoint, resp).await?;

        match parse_status(&body.status) {
            Some(SubmissionStatus::Submitted) => {}
            Some(SubmissionStatus::Rejected) => {
                return Err(RemoteError::Rejected {
                    endpoint: endpoint.to_string(),
                    reason: body.reason.unwrap_or_else(|| "rejected".to_string()),
                })
            }
            _ => {
                return Err(RemoteError::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    message: format!("unexpected submission status {:?}", body.status),
                })
            }
        }
        let reference = body
            .reference
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| RemoteError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: "submission accepted without a reference".to_string(),
            })?;

        tracing::info!(
            application_id = %request.application_id,
            %reference,
            "application submitted to RVO"
        );
        Ok(RvoSubmission {
            reference,
            attestation: request.attestation.clone(),
            documents: request.documents.clone(),
            submitted_at: body.submitted_at.unwrap_or_else(Timestamp::now),
            status: SubmissionStatus::Submitted,
        })
    }

    async fn fetch_status(&self, reference: &str) -> Result<StatusReport, RemoteError> {
        let endpoint = format!("GET /api/v1/submissions/{reference}/status");
        let url = join(&self.base_url, &format!("api/v1/submissions/{reference}/status"))?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;
        let body: StatusResponse = read_json(&endpoint, resp).await?;

        let status = parse_status(&body.status).ok_or_else(|| RemoteError::InvalidResponse {
            endpoint: endpoint.clone(),
            message: format!("unknown submission status {:?}", body.status),
        })?;
        Ok(StatusReport {
            reference: body.reference.unwrap_or_else(|| reference.to_string()),
            status,
            reason: body.reason,
            last_updated: body.last_updated.unwrap_or_else(Timestamp::now),
        })
    }

    fn gateway_name(&self) -> &'static str {
        "rvo-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_states_count_as_submitted() {
        assert_eq!(parse_status("under_review"), Some(SubmissionStatus::Submitted));
        assert_eq!(parse_status("RECEIVED"), Some(SubmissionStatus::Submitted));
        assert_eq!(parse_status("approved"), Some(SubmissionStatus::Approved));
        assert_eq!(parse_status("pending"), None);
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(status_error("x", StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(status_error("x", StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(!status_error("x", StatusCode::UNPROCESSABLE_ENTITY, "").is_transient());
    }

    #[test]
    fn rejection_reason_prefers_structured_message() {
        let body = r#"{"error":{"code":"DEADLINE","message":"Aanvraagperiode is gesloten"}}"#;
        assert_eq!(
            rejection_reason(StatusCode::UNPROCESSABLE_ENTITY, body),
            "Aanvraagperiode is gesloten"
        );
        assert_eq!(rejection_reason(StatusCode::CONFLICT, r#"{"reason":"duplicate"}"#), "duplicate");
        assert_eq!(rejection_reason(StatusCode::FORBIDDEN, "  no access "), "no access");
        assert_eq!(rejection_reason(StatusCode::FORBIDDEN, ""), "Forbidden");
    }
}
