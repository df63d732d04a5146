//! Worker traits and shared types.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::aria2::Aria2Status;
use crate::download::Download;
use crate::torrent::Torrent;

/// Errors that can occur inside workers and the bulk-status client.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timeout")]
    Timeout,

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("{0}")]
    Failed(String),
}

/// Which backend a download worker drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadClientKind {
    /// Built-in multipart HTTP downloader.
    Internal,
    /// External aria2c daemon driven over JSON-RPC.
    Aria2c,
    /// Symlinks into an rclone mount; no bytes move locally.
    Symlink,
}

impl DownloadClientKind {
    pub fn is_symlink(&self) -> bool {
        matches!(self, DownloadClientKind::Symlink)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadClientKind::Internal => "internal",
            DownloadClientKind::Aria2c => "aria2c",
            DownloadClientKind::Symlink => "symlink",
        }
    }
}

/// One in-flight file transfer.
///
/// Workers run on their own tasks; the runner observes them only through
/// `finished()`/`error()` and drops its registry entry once a finished
/// worker has been swept.
#[async_trait]
pub trait DownloadWorker: Send + Sync {
    /// Backend tag, used for bulk-status dispatch.
    fn kind(&self) -> DownloadClientKind;

    /// True once the transfer ended, successfully or not.
    fn finished(&self) -> bool;

    /// Failure message when the transfer ended badly.
    fn error(&self) -> Option<String>;

    /// Launch the transfer. Returns the backend-assigned remote id,
    /// when the backend has one.
    async fn start(&self) -> Result<Option<String>, WorkerError>;

    /// Consume a bulk-status snapshot. Only backends with a bulk
    /// endpoint (aria2c) implement this; the default is a no-op.
    fn update_status(&self, _statuses: &[Aria2Status]) {}
}

/// One in-flight archive extraction.
#[async_trait]
pub trait UnpackWorker: Send + Sync {
    /// True once the extraction ended, successfully or not.
    fn finished(&self) -> bool;

    /// Failure message when the extraction ended badly.
    fn error(&self) -> Option<String>;

    /// Launch the extraction.
    async fn start(&self) -> Result<(), WorkerError>;
}

/// Builds workers for the runner. The concrete worker types live with
/// the download-client integrations; the runner only needs this seam.
pub trait WorkerFactory: Send + Sync {
    fn download_worker(
        &self,
        download: &Download,
        torrent: &Torrent,
        target_dir: &Path,
    ) -> Arc<dyn DownloadWorker>;

    fn unpack_worker(
        &self,
        download: &Download,
        torrent: &Torrent,
        target_dir: &Path,
    ) -> Arc<dyn UnpackWorker>;
}

/// Bulk status source for backends that can report every transfer in
/// one request.
#[async_trait]
pub trait BulkStatusClient: Send + Sync {
    async fn tell_all(&self) -> Result<Vec<Aria2Status>, WorkerError>;
}
