//! API server configuration.

use std::net::SocketAddr;

use subsi_client::mock::DHI_SCHEME_URL;
use subsi_vc::DEFAULT_ISSUER;

/// Server settings. `Debug` redacts secrets.
#[derive(Clone)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Bearer token required on `/v1/*`. `None` disables authentication.
    pub auth_token: Option<String>,
    /// Scheme analysed when a start request names none.
    pub default_scheme_url: String,
    /// Attestation issuer name.
    pub issuer: String,
    /// Hex Ed25519 seed for the attestation signer. Ephemeral if unset.
    pub signing_seed: Option<String>,
    /// PIN the applicant confirms attestations with. The demo PIN if unset.
    pub confirmation_pin: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind", &self.bind)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("default_scheme_url", &self.default_scheme_url)
            .field("issuer", &self.issuer)
            .field("signing_seed", &self.signing_seed.as_ref().map(|_| "[REDACTED]"))
            .field("confirmation_pin", &self.confirmation_pin.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            auth_token: None,
            default_scheme_url: DHI_SCHEME_URL.to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            signing_seed: None,
            confirmation_pin: None,
        }
    }
}

impl ApiConfig {
    /// Read `SUBSI_BIND`, `SUBSI_AUTH_TOKEN`, `SUBSI_SCHEME_URL`,
    /// `SUBSI_ISSUER`, `SUBSI_SIGNING_SEED` and `SUBSI_CONFIRMATION_PIN`,
    /// falling back to defaults.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let defaults = Self::default();
        let bind = match std::env::var("SUBSI_BIND") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ApiConfigError::InvalidBind(raw))?,
            Err(_) => defaults.bind,
        };
        Ok(Self {
            bind,
            auth_token: non_empty_var("SUBSI_AUTH_TOKEN"),
            default_scheme_url: non_empty_var("SUBSI_SCHEME_URL").unwrap_or(defaults.default_scheme_url),
            issuer: non_empty_var("SUBSI_ISSUER").unwrap_or(defaults.issuer),
            signing_seed: non_empty_var("SUBSI_SIGNING_SEED"),
            confirmation_pin: non_empty_var("SUBSI_CONFIRMATION_PIN"),
        })
    }
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ApiConfigError {
    #[error("invalid SUBSI_BIND address: {0:?}")]
    InvalidBind(String),
    #[error("invalid SUBSI_SIGNING_SEED: {0}")]
    InvalidSeed(String),
}
