//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of every collaborator
//! seam, allowing comprehensive lifecycle testing without a debrid
//! account, a database or a running download client.
//!
//! # Example
//!
//! ```rust,ignore
//! use debrix_core::testing::{MockDownloadStore, MockTorrentsFacade, fixtures};
//!
//! let downloads = Arc::new(MockDownloadStore::new());
//! let torrents = Arc::new(MockTorrentsFacade::new(Arc::clone(&downloads)));
//!
//! torrents.insert_torrent(fixtures::finished_torrent("t1")).await;
//! torrents.stage_downloads("t1", vec![fixtures::queued_download("d1", "t1")]).await;
//!
//! // Wire into a TorrentRunner...
//! ```

mod mock_bulk_status;
mod mock_downloads;
mod mock_progress;
mod mock_torrents;
mod mock_workers;

pub use mock_bulk_status::MockBulkStatusClient;
pub use mock_downloads::MockDownloadStore;
pub use mock_progress::MockProgressReporter;
pub use mock_torrents::{MockTorrentsFacade, RecordedComplete};
pub use mock_workers::{MockDownloadWorker, MockUnpackWorker, MockWorkerFactory};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::download::Download;
    use crate::torrent::{FinishedAction, HostDownloadAction, RdStatus, Torrent};

    /// Create a freshly added torrent with reasonable defaults.
    pub fn torrent(id: &str) -> Torrent {
        Torrent {
            id: id.to_string(),
            hash: format!("{id}00cafebabe"),
            rd_status: RdStatus::Queued,
            rd_status_raw: "queued".to_string(),
            added: Utc::now(),
            files_selected: None,
            completed: None,
            retry: None,
            retry_count: 0,
            torrent_retry_attempts: 1,
            download_retry_attempts: 1,
            lifetime: 0,
            delete_on_error: 0,
            finished_action: FinishedAction::None,
            host_download_action: HostDownloadAction::DownloadAll,
            category: None,
            error: None,
            downloads: vec![],
        }
    }

    /// Create a torrent the cloud already finished fetching.
    pub fn finished_torrent(id: &str) -> Torrent {
        let mut torrent = torrent(id);
        torrent.rd_status = RdStatus::Finished;
        torrent.rd_status_raw = "downloaded".to_string();
        torrent
    }

    /// Create a download waiting to be started.
    pub fn queued_download(id: &str, torrent_id: &str) -> Download {
        Download {
            id: id.to_string(),
            torrent_id: torrent_id.to_string(),
            link: None,
            remote_id: None,
            download_queued: Some(Utc::now()),
            download_started: None,
            download_finished: None,
            unpacking_queued: None,
            unpacking_started: None,
            unpacking_finished: None,
            completed: None,
            error: None,
            retry_count: 0,
            bytes_total: 0,
            bytes_done: 0,
        }
    }

    /// Create a queued download with its link already resolved.
    pub fn linked_download(id: &str, torrent_id: &str, link: &str) -> Download {
        let mut download = queued_download(id, torrent_id);
        download.link = Some(link.to_string());
        download
    }
}
