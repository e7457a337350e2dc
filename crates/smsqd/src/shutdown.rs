//! One-shot shutdown signal shared by every pipeline task.
//!
//! Thin wrapper over [`CancellationToken`]: it fires once, never resets,
//! and every clone observes the same state.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Broadcast shutdown signal.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    /// Non-blocking check.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal has fired.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Sleeps for `duration` unless shutdown fires first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if interrupted
    /// by shutdown (including when shutdown had already fired).
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;

            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl From<CancellationToken> for Shutdown {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}
