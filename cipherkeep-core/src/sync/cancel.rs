//! Cooperative cancellation for network-bound operations.

use crate::{KeeperError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation signal.
///
/// Every clone observes the same flag; once cancelled it stays cancelled.
#[derive(Clone, Debug)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` unless cancellation fires first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(KeeperError::Cancelled);
        }
        tokio::select! {
            _ = self.cancelled() => Err(KeeperError::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_passes_through() {
        let cancel = Cancellation::new();
        let value = cancel.guard(async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let cancel = Cancellation::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<()> = cancel
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(KeeperError::Cancelled)));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let result = cancel.guard(async { Ok(1) }).await;
        assert!(matches!(result, Err(KeeperError::Cancelled)));
    }
}
