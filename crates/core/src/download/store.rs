//! Persistent store seam for download rows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Download;

/// Errors surfaced by the download store.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Download not found.
    #[error("download not found: {0}")]
    NotFound(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Durable storage for download rows. The store is the single source of
/// truth; the runner mutates rows only through it and treats in-memory
/// copies as a per-tick cache.
///
/// Stage setters take an `Option` so the start-of-process recovery sweep
/// can rewind a stage by writing `None`.
#[async_trait]
pub trait DownloadStore: Send + Sync {
    /// Load a single download row.
    async fn get(&self, download_id: &str) -> Result<Option<Download>, DownloadError>;

    async fn update_download_started(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_download_finished(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_unpacking_queued(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_unpacking_started(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_unpacking_finished(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_completed(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError>;

    async fn update_error(
        &self,
        download_id: &str,
        message: Option<String>,
    ) -> Result<(), DownloadError>;

    async fn update_retry_count(&self, download_id: &str, count: u32)
        -> Result<(), DownloadError>;

    /// Clear every stage timestamp except `download_queued`, plus the
    /// error, so the download is re-picked by a later tick.
    async fn reset(&self, download_id: &str) -> Result<(), DownloadError>;

    /// Record backend-assigned remote ids for a batch of downloads.
    async fn update_remote_id_batch(
        &self,
        remote_ids: HashMap<String, String>,
    ) -> Result<(), DownloadError>;

    /// Record start failures for a batch of downloads.
    async fn update_error_batch(
        &self,
        errors: HashMap<String, String>,
    ) -> Result<(), DownloadError>;
}
