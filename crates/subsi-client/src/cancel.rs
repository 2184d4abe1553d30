//! Cancellation of in-flight remote calls.
//!
//! A [`CancelSource`] hands out [`CallToken`]s stamped with the current
//! generation. [`CancelSource::cancel`] bumps the generation, which cancels
//! every token issued before it; tokens issued afterwards are live again.
//! Built on a `tokio::sync::watch` channel so that any number of waiters
//! observe the same cancellation.

use std::future::Future;

use tokio::sync::watch;

use crate::error::RemoteError;

#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<u64>,
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// A token for a call starting now.
    pub fn token(&self) -> CallToken {
        CallToken {
            generation: *self.tx.borrow(),
            rx: self.tx.subscribe(),
        }
    }

    /// Cancel every outstanding token.
    pub fn cancel(&self) {
        self.tx.send_modify(|g| *g = g.wrapping_add(1));
    }
}

#[derive(Debug, Clone)]
pub struct CallToken {
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl CallToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() != self.generation
    }

    /// Resolves once the token is cancelled. Never resolves if the source
    /// is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run `fut` unless `token` is cancelled first.
///
/// On cancellation `fut` is dropped and [`RemoteError::Cancelled`] returned.
pub async fn cancellable<T, Fut>(mut token: CallToken, fut: Fut) -> Result<T, RemoteError>
where
    Fut: Future<Output = Result<T, RemoteError>>,
{
    if token.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }
    tokio::select! {
        biased;
        () = token.cancelled() => Err(RemoteError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_stops_pending_call() {
        let source = CancelSource::new();
        let token = source.token();
        let call = tokio::spawn(cancellable(token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, RemoteError>(())
        }));
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();
        let result = call.await.unwrap();
        assert!(matches!(result, Err(RemoteError::Cancelled)));
    }

    #[tokio::test]
    async fn tokens_after_cancel_are_live() {
        let source = CancelSource::new();
        let old = source.token();
        source.cancel();
        let new = source.token();
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
        assert_eq!(cancellable(new, async { Ok(5) }).await.unwrap(), 5);
        assert!(matches!(
            cancellable(old, async { Ok(5) }).await,
            Err(RemoteError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn completed_call_is_unaffected_by_later_cancel() {
        let source = CancelSource::new();
        let value = cancellable(source.token(), async { Ok("done") }).await.unwrap();
        source.cancel();
        assert_eq!(value, "done");
    }
}
