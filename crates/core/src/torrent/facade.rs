//! The debrid facade seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Torrent;

/// Errors surfaced by the torrent facade.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Torrent not found.
    #[error("torrent not found: {0}")]
    NotFound(String),

    /// The debrid provider rejected or failed a request.
    #[error("provider error: {0}")]
    Provider(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),
}

/// Everything the runner consumes from the torrent side of the system:
/// the persistent torrent rows, the debrid provider operations, and the
/// post-completion hook. Implementations own all durable writes; the
/// runner never touches the store directly for torrent rows.
#[async_trait]
pub trait TorrentsFacade: Send + Sync {
    /// Load every torrent with its child downloads attached.
    async fn get(&self) -> Result<Vec<Torrent>, TorrentError>;

    /// Resolve a download's restricted link into a direct URL. The
    /// resolved link is persisted on the download row before it is
    /// returned.
    async fn unrestrict_link(&self, download_id: &str) -> Result<String, TorrentError>;

    /// Re-submit a torrent to the provider. The facade owns the retry
    /// counter: it increments `retry_count` and clears the retry marker
    /// as part of the re-submission.
    async fn retry_torrent(&self, torrent_id: &str, retry_count: u32) -> Result<(), TorrentError>;

    /// Overwrite the retry marker and counter.
    async fn update_retry(
        &self,
        torrent_id: &str,
        retry: Option<DateTime<Utc>>,
        retry_count: u32,
    ) -> Result<(), TorrentError>;

    /// Confirm the file selection to the provider.
    async fn select_files(&self, torrent_id: &str) -> Result<(), TorrentError>;

    /// Record when file selection was confirmed.
    async fn update_files_selected(
        &self,
        torrent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TorrentError>;

    /// Materialize the child download rows for a cloud-finished torrent.
    /// Called at most once per torrent.
    async fn create_downloads(&self, torrent_id: &str) -> Result<(), TorrentError>;

    /// Record an error on the torrent without completing it.
    async fn update_error(&self, torrent_id: &str, message: &str) -> Result<(), TorrentError>;

    /// Mark the torrent completed at `at`, with an optional error.
    /// `terminal` is false when the failure is transient enough that the
    /// facade may still honor a retry request for this torrent.
    async fn update_complete(
        &self,
        torrent_id: &str,
        error: Option<String>,
        at: DateTime<Utc>,
        terminal: bool,
    ) -> Result<(), TorrentError>;

    /// Delete the torrent from the selected places.
    async fn delete(
        &self,
        torrent_id: &str,
        remove_remote: bool,
        remove_client: bool,
        remove_files: bool,
    ) -> Result<(), TorrentError>;

    /// Best-effort post-completion hook (library notifications, user
    /// scripts). Failures are logged by the caller, never fatal.
    async fn run_torrent_complete(&self, torrent_id: &str) -> Result<(), TorrentError>;
}
