//! Cancellation token for a scan, tripped by Ctrl-C.
//!
//! The scanner only looks at it between probes, so a lookup in flight always
//! finishes and gets recorded before the final checkpoint is written.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::warn;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel can't close while we wait.
        let _ = rx.wait_for(|requested| *requested).await;
    }

    /// Spawns a Ctrl-C listener. The first signal requests a graceful stop,
    /// a second one exits the process right away.
    pub fn listen_for_ctrl_c(&self) {
        let shutdown = self.clone();
        let signal_count = AtomicUsize::new(0);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let prev = signal_count.fetch_add(1, Ordering::AcqRel);
                if prev >= 1 {
                    warn!("Second interrupt received; exiting without a final checkpoint");
                    std::process::exit(130);
                }
                warn!("Interrupt received, stopping after the current parcel...");
                shutdown.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Duration};

    use super::*;

    #[tokio::test]
    async fn starts_untriggered() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        assert!(timeout(Duration::from_millis(20), shutdown.requested())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn trigger_is_seen_by_clones() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();
        let waiter = tokio::spawn(async move { clone.requested().await });

        shutdown.trigger();
        assert!(shutdown.is_requested());
        assert!(timeout(Duration::from_millis(100), waiter).await.is_ok());
    }

    #[tokio::test]
    async fn requested_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(timeout(Duration::from_millis(100), shutdown.requested())
            .await
            .is_ok());
    }
}
