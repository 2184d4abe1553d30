//! Retry with exponential backoff for remote operations.
//!
//! Retries only [`RemoteError::Unavailable`]. Rejections, invalid responses
//! and invalid credentials are returned immediately. After the last attempt
//! the `Unavailable` error carries the total attempt count.
//!
//! The returned future is cancel-safe: dropping it (for instance from a
//! `tokio::select!` in [`crate::cancel::cancellable`]) abandons any pending
//! backoff sleep and in-flight attempt.

use std::future::Future;

use crate::config::RetryPolicy;
use crate::error::RemoteError;

/// Run `f` until it succeeds, fails permanently, or the policy is exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    for attempt in 0..policy.max_retries {
        match f().await {
            Err(e) if e.is_transient() => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "remote call failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
    match f().await {
        Err(RemoteError::Unavailable {
            endpoint, message, ..
        }) => Err(RemoteError::Unavailable {
            endpoint,
            attempts: policy.attempts(),
            message,
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn exhausts_all_attempts_on_transient_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RemoteError::unavailable("GET /x", "connection refused")) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(matches!(result, Err(RemoteError::Unavailable { attempts: 4, .. })));
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RemoteError::Rejected {
                    endpoint: "POST /submissions".into(),
                    reason: "deadline passed".into(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RemoteError::Rejected { .. })));
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RemoteError::unavailable("GET /x", "503"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }
}
