//! Remote progress seam.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a progress push.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress push failed: {0}")]
    Push(String),
}

/// Side-channel that pushes the current torrent snapshots to remote
/// subscribers. Called once at the end of every tick; the push is
/// idempotent and a failure never affects the tick.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn update(&self) -> Result<(), ProgressError>;
}
