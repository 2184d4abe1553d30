//! # API Error Types
//!
//! Maps domain errors from subsi-state, subsi-vc and subsi-client to HTTP
//! status codes with a JSON body:
//!
//! ```json
//! {"error": {"code": "REMOTE_UNAVAILABLE", "message": "..."}}
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subsi_client::RemoteError;
use subsi_state::{DraftError, FlowError, PlanError};
use subsi_vc::{AttestationError, ConfirmationError, CredentialError, RequirementsError};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Request content violates a domain rule (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The applicant's confirmation did not verify (403).
    #[error("{0}")]
    Refused(String),

    /// The request conflicts with the session's current state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// More information is needed before this step (422).
    #[error("more information needed: {0}")]
    Incomplete(String),

    /// A remote service refused the request. The message is the remote's
    /// reason, verbatim.
    #[error("{0}")]
    Rejected(String),

    /// A remote service stayed unavailable after retries (503).
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// The operation was cancelled or superseded (409).
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Message is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Refused(_) => (StatusCode::FORBIDDEN, "CONFIRMATION_REFUSED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Incomplete(_) => (StatusCode::UNPROCESSABLE_ENTITY, "DRAFT_INCOMPLETE"),
            Self::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "REJECTED"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "REMOTE_UNAVAILABLE"),
            Self::Cancelled(_) => (StatusCode::CONFLICT, "CANCELLED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Cancelled(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match &err {
            RemoteError::Unavailable { .. } => Self::Unavailable(err.to_string()),
            RemoteError::Rejected { reason, .. } => Self::Rejected(reason.clone()),
            RemoteError::InvalidCredential(e) => Self::Validation(e.to_string()),
            RemoteError::Cancelled => Self::Cancelled("cancelled by the applicant".into()),
            RemoteError::InvalidResponse { .. } => Self::Unavailable(err.to_string()),
            RemoteError::Config(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<DraftError> for AppError {
    fn from(err: DraftError) -> Self {
        match &err {
            DraftError::UnknownField { .. }
            | DraftError::NonCanonicalValue { .. }
            | DraftError::Credential(_) => Self::Validation(err.to_string()),
            DraftError::NotComplete { .. } => Self::Incomplete(err.to_string()),
            DraftError::AlreadySubmitted { .. } | DraftError::AttestationMismatch { .. } => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        match &err {
            FlowError::StaleOperation { .. } => Self::Cancelled(err.to_string()),
            FlowError::IllegalTransition { .. }
            | FlowError::PreconditionUnmet { .. }
            | FlowError::OperationInFlight { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<AttestationError> for AppError {
    fn from(err: AttestationError) -> Self {
        match &err {
            AttestationError::DraftIncomplete { .. } => Self::Incomplete(err.to_string()),
            AttestationError::Signing(_) => Self::Unavailable(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<ConfirmationError> for AppError {
    fn from(err: ConfirmationError) -> Self {
        match &err {
            ConfirmationError::Refused(_) => Self::Refused(err.to_string()),
            ConfirmationError::Unavailable(_) => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<RequirementsError> for AppError {
    fn from(err: RequirementsError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        Self::Validation(err.to_string())
    }
}
