//! Core torrent data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::download::Download;

/// Remote status reported by the debrid service for a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RdStatus {
    /// Accepted, waiting for the cloud to pick it up.
    Queued,
    /// Cloud is fetching the torrent.
    Downloading,
    /// Cloud-side post-processing (hash checks, repacking).
    Processing,
    /// Cloud is moving the content into its link store.
    Uploading,
    /// Needs a file selection before the cloud proceeds.
    WaitingForFileSelection,
    /// Content is available behind restricted links.
    Finished,
    /// The cloud gave up on this torrent.
    Error,
}

impl RdStatus {
    /// Returns the string representation for logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            RdStatus::Queued => "queued",
            RdStatus::Downloading => "downloading",
            RdStatus::Processing => "processing",
            RdStatus::Uploading => "uploading",
            RdStatus::WaitingForFileSelection => "waiting_for_file_selection",
            RdStatus::Finished => "finished",
            RdStatus::Error => "error",
        }
    }
}

/// What to do with a torrent once every child download has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishedAction {
    /// Leave everything in place.
    None,
    /// Remove the torrent everywhere, keeping the downloaded files.
    RemoveAllTorrents,
    /// Remove the client-side row, keeping the remote torrent and files.
    RemoveRealDebrid,
    /// Remove the remote torrent, keeping the client-side row and files.
    RemoveClient,
}

impl FinishedAction {
    /// Delete flags `(remove_remote, remove_client, remove_files)` for
    /// this action, or `None` when nothing is deleted.
    pub fn delete_flags(&self) -> Option<(bool, bool, bool)> {
        match self {
            FinishedAction::None => None,
            FinishedAction::RemoveAllTorrents => Some((true, true, false)),
            FinishedAction::RemoveRealDebrid => Some((false, true, false)),
            FinishedAction::RemoveClient => Some((true, false, false)),
        }
    }
}

/// Whether child downloads should be fetched to local storage at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostDownloadAction {
    /// Fetch every file the cloud exposes.
    DownloadAll,
    /// Leave the content in the cloud; the torrent completes as soon as
    /// the cloud finishes.
    DownloadNone,
}

/// A user-submitted torrent with its remote and local state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Torrent {
    /// Stable opaque identifier.
    pub id: String,
    /// Info hash (lowercase hex).
    pub hash: String,

    /// Parsed remote status.
    pub rd_status: RdStatus,
    /// Raw status string as the provider reported it. Used verbatim as
    /// the terminal error when `rd_status` is [`RdStatus::Error`].
    pub rd_status_raw: String,

    /// When the torrent was submitted.
    pub added: DateTime<Utc>,
    /// When file selection was confirmed to the cloud.
    pub files_selected: Option<DateTime<Utc>>,
    /// Terminal timestamp; once set the torrent is never worked on
    /// again, only retention policies apply.
    pub completed: Option<DateTime<Utc>>,

    /// Non-null requests a retry on the next tick.
    pub retry: Option<DateTime<Utc>>,
    /// How many retries this torrent has consumed.
    pub retry_count: u32,
    /// Retry budget for the torrent itself.
    pub torrent_retry_attempts: u32,
    /// Retry budget applied to each child download.
    pub download_retry_attempts: u32,

    /// Minutes after `added` before a torrent that never produced
    /// downloads is expired. Zero disables expiry.
    pub lifetime: i64,
    /// Minutes after `completed` before an error-terminal torrent is
    /// deleted. Zero disables the cleanup.
    pub delete_on_error: i64,
    /// Cleanup performed when the torrent completes successfully.
    pub finished_action: FinishedAction,

    /// Whether files are fetched locally.
    pub host_download_action: HostDownloadAction,
    /// Free-form routing category; appended (lower-cased) to the
    /// download path.
    pub category: Option<String>,

    /// Terminal error message, if any.
    pub error: Option<String>,

    /// Child downloads, created once by the facade after file selection.
    pub downloads: Vec<Download>,
}

impl Torrent {
    /// Returns true once the torrent reached a terminal state.
    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// The category as a path component: trimmed, lower-cased, `None`
    /// when empty.
    pub fn category_suffix(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_lowercase)
    }
}
