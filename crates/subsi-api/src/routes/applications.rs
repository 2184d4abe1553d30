//! # Applications API
//!
//! Routes:
//! - POST  /v1/applications — Analyse a scheme and start an application
//! - GET   /v1/applications/{id} — Current session view
//! - POST  /v1/applications/{id}/credentials — Load wallet credentials
//! - PATCH /v1/applications/{id}/information — Update answers, plan and budget
//! - POST  /v1/applications/{id}/advance — Leave the current stage
//! - POST  /v1/applications/{id}/attestation — Build and sign the attestation
//! - POST  /v1/applications/{id}/attestation/confirm — Applicant confirms the attestation
//! - POST  /v1/applications/{id}/submit — Submit to RVO
//! - POST  /v1/applications/{id}/cancel — Cancel the in-flight operation
//! - GET   /v1/applications/{id}/status — Poll the submission status
//!
//! Handlers lock the session only for local bookkeeping. Remote calls go
//! through [`crate::session`], which releases the lock while they run.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use subsi_core::{ApplicationId, FieldId};
use subsi_state::{Outcome, PendingOperation};
use subsi_vc::{Attestation, AttestationConfirmation, ConfirmationProof, RvoSubmission, WalletCredential};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::session::{self, ApplicationSession, InformationPatch, SessionView, SharedSession, StatusView};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/applications", post(start_application))
        .route("/v1/applications/{id}", get(get_application))
        .route("/v1/applications/{id}/credentials", post(load_credentials))
        .route(
            "/v1/applications/{id}/information",
            axum::routing::patch(update_information),
        )
        .route("/v1/applications/{id}/advance", post(advance))
        .route("/v1/applications/{id}/attestation", post(build_attestation))
        .route("/v1/applications/{id}/attestation/confirm", post(confirm_attestation))
        .route("/v1/applications/{id}/submit", post(submit))
        .route("/v1/applications/{id}/cancel", post(cancel))
        .route("/v1/applications/{id}/status", get(submission_status))
}

// ─── Request / Response Types ──────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Scheme to analyse; the configured default when absent.
    #[serde(default)]
    pub scheme_url: Option<String>,
    /// Additional fields the applicant must answer, from the scheme's
    /// field set.
    #[serde(default)]
    pub additional_fields: Vec<FieldId>,
    /// Ask for the scheme's whole field set instead.
    #[serde(default)]
    pub full_field_set: bool,
}

impl Validate for StartRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.scheme_url {
            if url.trim().is_empty() {
                return Err("schemeUrl must not be empty".into());
            }
        }
        if self.full_field_set && !self.additional_fields.is_empty() {
            return Err("give either additionalFields or fullFieldSet, not both".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsUpload {
    pub credentials: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub outcome: Outcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub cancelled: Option<PendingOperation>,
}

// ─── Handlers ──────────────────────────────────────────────────────

/// POST /v1/applications — Analyse the scheme and open a session.
///
/// No session exists until the analysis has succeeded. Requested fields
/// outside the scheme's field set are a 422.
async fn start_application(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let req = extract_validated_json(body)?;
    let scheme_url = req
        .scheme_url
        .unwrap_or_else(|| state.config.default_scheme_url.clone());

    let analysis = session::analyze_scheme(&state.services, &scheme_url).await?;
    let additional_fields = if req.full_field_set {
        analysis.field_set()
    } else {
        req.additional_fields
    };
    let id = ApplicationId::new();
    let (scheme, attestations) = (analysis.url.clone(), analysis.attestations.len());
    let session = ApplicationSession::new(id, analysis, &additional_fields)?;
    tracing::info!(
        application_id = %id,
        %scheme,
        attestations,
        additional_fields = additional_fields.len(),
        "application started"
    );
    let shared = state.sessions.insert(session);
    let view = shared.lock().await.view();
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /v1/applications/{id}
async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let shared = lookup(&state, &id)?;
    let view = shared.lock().await.view();
    Ok(Json(view))
}

/// POST /v1/applications/{id}/credentials — Attach uploaded credentials,
/// or fetch them from the wallet when the body is empty.
async fn load_credentials(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionView>, AppError> {
    let shared = lookup(&state, &id)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        let view = session::retrieve_credentials(&shared, &state.services).await?;
        return Ok(Json(view));
    }

    let upload: CredentialsUpload =
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid credentials body: {e}")))?;
    let credentials = upload
        .credentials
        .into_iter()
        .map(WalletCredential::from_json)
        .collect::<Result<Vec<_>, _>>()?;

    let mut s = shared.lock().await;
    s.attach_credentials(credentials)?;
    Ok(Json(s.view()))
}

/// PATCH /v1/applications/{id}/information
async fn update_information(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<InformationPatch>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let shared = lookup(&state, &id)?;
    let patch = extract_json(body)?;
    let mut s = shared.lock().await;
    s.update_information(patch)?;
    Ok(Json(s.view()))
}

/// POST /v1/applications/{id}/advance
async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AdvanceRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let shared = lookup(&state, &id)?;
    let req = extract_json(body)?;
    let mut s = shared.lock().await;
    s.advance(req.outcome)?;
    Ok(Json(s.view()))
}

/// POST /v1/applications/{id}/attestation
async fn build_attestation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Attestation>, AppError> {
    let shared = lookup(&state, &id)?;
    let attestation = session::build_attestation(&shared, &state.builder, state.signer.as_ref()).await?;
    Ok(Json(attestation))
}

/// POST /v1/applications/{id}/attestation/confirm
async fn confirm_attestation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ConfirmationProof>, JsonRejection>,
) -> Result<Json<AttestationConfirmation>, AppError> {
    let shared = lookup(&state, &id)?;
    let proof = extract_json(body)?;
    let confirmation = session::confirm_attestation(&shared, state.verifier.as_ref(), proof).await?;
    Ok(Json(confirmation))
}

/// POST /v1/applications/{id}/submit
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RvoSubmission>), AppError> {
    let shared = lookup(&state, &id)?;
    let submission = session::submit(&shared, &state.services).await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// POST /v1/applications/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let shared = lookup(&state, &id)?;
    let cancelled = shared.lock().await.cancel();
    Ok(Json(CancelResponse { cancelled }))
}

/// GET /v1/applications/{id}/status
async fn submission_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusView>, AppError> {
    let shared = lookup(&state, &id)?;
    let status = session::poll_status(&shared, &state.services).await?;
    Ok(Json(status))
}

fn lookup(state: &AppState, raw: &str) -> Result<SharedSession, AppError> {
    let id = ApplicationId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
    state
        .sessions
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("application {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_rejects_conflicting_field_choices() {
        let req = StartRequest {
            additional_fields: vec![FieldId::new("projectLocationDHI").unwrap()],
            full_field_set: true,
            ..Default::default()
        };
        assert!(req.validate().is_err());
        assert!(StartRequest::default().validate().is_ok());
    }

    #[test]
    fn start_request_rejects_blank_scheme() {
        let req = StartRequest {
            scheme_url: Some("  ".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
