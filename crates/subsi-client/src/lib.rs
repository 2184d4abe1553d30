//! # subsi-client — Remote Collaborators
//!
//! The wallet source, the scheme requirements source and the RVO
//! submission gateway, behind traits (`adapter.rs`) with HTTP (`http.rs`)
//! and mock (`mock.rs`) implementations.
//!
//! Implementations make one attempt per call. Callers compose
//! [`retry::with_retry`] and [`cancel::cancellable`] around them:
//!
//! ```ignore
//! let token = cancel_source.token();
//! let creds = cancellable(token, with_retry(&policy, "wallet", || {
//!     services.wallet.fetch_credentials(id)
//! })).await?;
//! ```

pub mod adapter;
pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod retry;

use std::sync::Arc;

pub use adapter::{RequirementsSource, StatusReport, SubmissionGateway, SubmissionRequest, WalletSource};
pub use cancel::{cancellable, CallToken, CancelSource};
pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use error::RemoteError;
pub use http::{HttpRequirementsSource, HttpSubmissionGateway, HttpWalletSource};
pub use mock::{MockRequirementsSource, MockSubmissionGateway, MockSubmitOutcome, MockWalletSource};
pub use retry::with_retry;

/// The collaborators a session needs, plus the retry policy to use with
/// them.
#[derive(Clone)]
pub struct RemoteServices {
    pub wallet: Arc<dyn WalletSource>,
    pub requirements: Arc<dyn RequirementsSource>,
    pub gateway: Arc<dyn SubmissionGateway>,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for RemoteServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteServices")
            .field("wallet", &self.wallet.source_name())
            .field("requirements", &self.requirements.source_name())
            .field("gateway", &self.gateway.gateway_name())
            .field("retry", &self.retry)
            .finish()
    }
}

impl RemoteServices {
    /// HTTP clients for every collaborator.
    pub fn http(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            wallet: Arc::new(HttpWalletSource::new(config)?),
            requirements: Arc::new(HttpRequirementsSource::new(config)?),
            gateway: Arc::new(HttpSubmissionGateway::new(config)?),
            retry: config.retry,
        })
    }

    /// Demo wallet, DHI analysis and an accepting gateway.
    pub fn mock() -> Result<Self, RemoteError> {
        Ok(Self {
            wallet: Arc::new(MockWalletSource::demo()?),
            requirements: Arc::new(MockRequirementsSource::dhi()),
            gateway: Arc::new(MockSubmissionGateway::accepting()),
            retry: RetryPolicy::default(),
        })
    }
}
