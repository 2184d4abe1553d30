//! Remote operation errors.

use subsi_vc::CredentialError;

use crate::config::ConfigError;

/// Errors from remote collaborators.
///
/// Only [`RemoteError::Unavailable`] is transient; everything else is
/// returned to the caller on the first occurrence.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure, timeout, 5xx or 429. Retried with backoff.
    #[error("{endpoint} unavailable after {attempts} attempt(s): {message}")]
    Unavailable {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    /// The remote refused the request. Never retried; the reason is
    /// surfaced verbatim.
    #[error("{endpoint} rejected the request: {reason}")]
    Rejected { endpoint: String, reason: String },

    /// The remote answered with something that is not a valid response.
    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// The wallet returned a credential that does not match its type.
    #[error(transparent)]
    InvalidCredential(#[from] CredentialError),

    /// The call was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RemoteError {
    pub(crate) fn unavailable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            endpoint: endpoint.into(),
            attempts: 1,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
