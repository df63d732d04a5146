//! Core download data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One child file of a torrent: one restricted link, one local file,
/// optionally one unpack.
///
/// The stage timestamps advance strictly left to right and are never
/// cleared once their successor is set:
/// `download_queued ≤ download_started ≤ download_finished ≤
/// unpacking_queued ≤ unpacking_started ≤ unpacking_finished ≤ completed`.
/// The single exception is the start-of-process recovery sweep, which
/// rewinds a `*_started` stamp whose stage never finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    /// Stable opaque identifier.
    pub id: String,
    /// Parent torrent.
    pub torrent_id: String,

    /// Direct download URL, resolved lazily through the facade.
    pub link: Option<String>,
    /// Identifier assigned by the download backend on start.
    pub remote_id: Option<String>,

    pub download_queued: Option<DateTime<Utc>>,
    pub download_started: Option<DateTime<Utc>>,
    pub download_finished: Option<DateTime<Utc>>,
    pub unpacking_queued: Option<DateTime<Utc>>,
    pub unpacking_started: Option<DateTime<Utc>>,
    pub unpacking_finished: Option<DateTime<Utc>>,
    /// Terminal timestamp; once set no further stage transitions occur.
    pub completed: Option<DateTime<Utc>>,

    /// Terminal failure message. A download with an error set is never
    /// picked up again.
    pub error: Option<String>,
    /// Retries consumed; capped by the parent torrent's
    /// `download_retry_attempts`.
    pub retry_count: u32,

    /// Total size in bytes, maintained by the worker.
    pub bytes_total: u64,
    /// Downloaded bytes, maintained by the worker.
    pub bytes_done: u64,
}

impl Download {
    /// Returns true once the download reached a terminal state.
    pub fn is_completed(&self) -> bool {
        self.completed.is_some()
    }

    /// Eligible for a download start: queued, never started, not failed.
    pub fn awaits_download(&self) -> bool {
        self.completed.is_none()
            && self.error.is_none()
            && self.download_queued.is_some()
            && self.download_started.is_none()
    }

    /// Eligible for an unpack start: queued for unpack, never started,
    /// not failed.
    pub fn awaits_unpack(&self) -> bool {
        self.completed.is_none()
            && self.error.is_none()
            && self.unpacking_queued.is_some()
            && self.unpacking_started.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_awaits_download() {
        let mut download = fixtures::queued_download("d1", "t1");
        assert!(download.awaits_download());

        download.download_started = Some(Utc::now());
        assert!(!download.awaits_download());

        download.download_started = None;
        download.error = Some("boom".to_string());
        assert!(!download.awaits_download());
    }

    #[test]
    fn test_awaits_unpack() {
        let mut download = fixtures::queued_download("d1", "t1");
        assert!(!download.awaits_unpack());

        download.unpacking_queued = Some(Utc::now());
        assert!(download.awaits_unpack());

        download.completed = Some(Utc::now());
        assert!(!download.awaits_unpack());
    }
}
