//! Remote service configuration.
//!
//! Base URLs for the wallet, the scheme analyser and the RVO gateway, the
//! bearer token they share, and the retry policy applied to every remote
//! operation. Load from the environment with [`ClientConfig::from_env`] or
//! point everything at a local mock with [`ClientConfig::local_mock`].

use std::time::Duration;

use url::Url;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based): 200ms, 400ms, 800ms, ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Configuration for the remote collaborators.
///
/// `Debug` redacts the token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Wallet service. Default: `http://127.0.0.1:8101`.
    pub wallet_url: Url,
    /// Scheme analyser. Default: `http://127.0.0.1:8102`.
    pub analysis_url: Url,
    /// RVO submission gateway. Default: `https://api.rvo.nl`.
    pub rvo_url: Url,
    /// Bearer token sent to every service.
    pub api_token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("wallet_url", &self.wallet_url)
            .field("analysis_url", &self.analysis_url)
            .field("rvo_url", &self.rvo_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// - `SUBSI_WALLET_URL` (default `http://127.0.0.1:8101`)
    /// - `SUBSI_ANALYSIS_URL` (default `http://127.0.0.1:8102`)
    /// - `SUBSI_RVO_URL` (default `https://api.rvo.nl`)
    /// - `SUBSI_API_TOKEN` (required)
    /// - `SUBSI_TIMEOUT_SECS` (default 30)
    /// - `SUBSI_MAX_RETRIES` (default 3)
    /// - `SUBSI_RETRY_BASE_DELAY_MS` (default 200)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("SUBSI_API_TOKEN").map_err(|_| ConfigError::MissingToken)?;
        if api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let defaults = RetryPolicy::default();

        Ok(Self {
            wallet_url: env_url("SUBSI_WALLET_URL", "http://127.0.0.1:8101")?,
            analysis_url: env_url("SUBSI_ANALYSIS_URL", "http://127.0.0.1:8102")?,
            rvo_url: env_url("SUBSI_RVO_URL", "https://api.rvo.nl")?,
            api_token,
            timeout_secs: env_parse("SUBSI_TIMEOUT_SECS", 30)?,
            retry: RetryPolicy {
                max_retries: env_parse("SUBSI_MAX_RETRIES", defaults.max_retries)?,
                base_delay_ms: env_parse("SUBSI_RETRY_BASE_DELAY_MS", defaults.base_delay_ms)?,
            },
        })
    }

    /// Point every service at one local mock server.
    pub fn local_mock(port: u16, token: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self::single_base(url, token))
    }

    /// Point every service at `base`.
    pub fn single_base(base: Url, token: &str) -> Self {
        Self {
            wallet_url: base.clone(),
            analysis_url: base.clone(),
            rvo_url: base,
            api_token: token.to_string(),
            timeout_secs: 5,
            retry: RetryPolicy {
                max_retries: 2,
                base_delay_ms: 10,
            },
        }
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SUBSI_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid number for {0}: {1:?}")]
    InvalidNumber(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_millis(200));
        assert_eq!(p.delay_for(1), Duration::from_millis(400));
        assert_eq!(p.delay_for(2), Duration::from_millis(800));
        assert_eq!(p.attempts(), 4);
        assert_eq!(RetryPolicy::none().attempts(), 1);
    }

    #[test]
    fn local_mock_points_everything_at_one_port() {
        let cfg = ClientConfig::local_mock(9000, "test-token").unwrap();
        assert_eq!(cfg.wallet_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.rvo_url, cfg.analysis_url);
        assert_eq!(cfg.api_token, "test-token");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ClientConfig::local_mock(9000, "super-secret").unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn env_helpers_use_defaults_and_reject_garbage() {
        assert_eq!(
            env_url("SUBSI_TEST_ABSENT_URL_1", "https://example.com").unwrap().as_str(),
            "https://example.com/"
        );
        assert_eq!(env_parse("SUBSI_TEST_ABSENT_NUM_1", 7u32).unwrap(), 7);

        std::env::set_var("SUBSI_TEST_BAD_NUM_1", "seven");
        let result = env_parse::<u32>("SUBSI_TEST_BAD_NUM_1", 7);
        std::env::remove_var("SUBSI_TEST_BAD_NUM_1");
        assert!(matches!(result, Err(ConfigError::InvalidNumber(..))));
    }
}
