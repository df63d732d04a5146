//! Types for the torrent runner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reconciling a single torrent. Nothing in
/// the runner propagates one of these past `tick()`; a reconciliation
/// error terminates its torrent and the tick moves on.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Torrent facade error.
    #[error("torrent facade error: {0}")]
    Torrent(#[from] crate::torrent::TorrentError),

    /// Download store error.
    #[error("download store error: {0}")]
    Download(#[from] crate::download::DownloadError),

    /// Worker error.
    #[error("worker error: {0}")]
    Worker(#[from] crate::worker::WorkerError),
}

/// Current runner occupancy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerStatus {
    /// Download workers currently registered.
    pub active_downloads: usize,
    /// Unpack workers currently registered.
    pub active_unpacks: usize,
}
