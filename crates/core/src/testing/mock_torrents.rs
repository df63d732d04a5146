//! Mock torrent facade for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::download::Download;
use crate::torrent::{Torrent, TorrentError, TorrentsFacade};

use super::MockDownloadStore;

/// A recorded `update_complete` call.
#[derive(Debug, Clone)]
pub struct RecordedComplete {
    pub torrent_id: String,
    pub error: Option<String>,
    pub terminal: bool,
}

/// Mock implementation of the [`TorrentsFacade`] trait.
///
/// Shares a [`MockDownloadStore`] so `get()` returns torrents with
/// their live download rows attached, the way the real facade joins
/// them. Provides controllable behavior for testing:
/// - Stage download rows to be materialized by `create_downloads`
/// - Configure per-download unrestrict results and failures
/// - Make `select_files` or the completion hook fail
/// - Record every mutating call for assertions
pub struct MockTorrentsFacade {
    downloads: Arc<MockDownloadStore>,
    torrents: RwLock<Vec<Torrent>>,
    staged: RwLock<HashMap<String, Vec<Download>>>,
    links: RwLock<HashMap<String, String>>,
    unrestrict_failures: RwLock<HashMap<String, String>>,
    select_files_failures: RwLock<HashMap<String, String>>,
    fail_run_complete: AtomicBool,

    select_files_calls: RwLock<Vec<String>>,
    create_downloads_calls: RwLock<Vec<String>>,
    retry_calls: RwLock<Vec<(String, u32)>>,
    complete_calls: RwLock<Vec<RecordedComplete>>,
    delete_calls: RwLock<Vec<(String, bool, bool, bool)>>,
    run_complete_calls: RwLock<Vec<String>>,
    unrestrict_calls: RwLock<Vec<String>>,
}

impl MockTorrentsFacade {
    /// Create a new mock facade over the given download store.
    pub fn new(downloads: Arc<MockDownloadStore>) -> Self {
        Self {
            downloads,
            torrents: RwLock::new(Vec::new()),
            staged: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
            unrestrict_failures: RwLock::new(HashMap::new()),
            select_files_failures: RwLock::new(HashMap::new()),
            fail_run_complete: AtomicBool::new(false),
            select_files_calls: RwLock::new(Vec::new()),
            create_downloads_calls: RwLock::new(Vec::new()),
            retry_calls: RwLock::new(Vec::new()),
            complete_calls: RwLock::new(Vec::new()),
            delete_calls: RwLock::new(Vec::new()),
            run_complete_calls: RwLock::new(Vec::new()),
            unrestrict_calls: RwLock::new(Vec::new()),
        }
    }

    /// Insert a torrent. Its `downloads` field is ignored; `get()`
    /// always attaches the store's current rows.
    pub async fn insert_torrent(&self, mut torrent: Torrent) {
        torrent.downloads.clear();
        self.torrents.write().await.push(torrent);
    }

    /// Read back one torrent with its downloads attached.
    pub async fn torrent(&self, torrent_id: &str) -> Option<Torrent> {
        let stored = self
            .torrents
            .read()
            .await
            .iter()
            .find(|t| t.id == torrent_id)
            .cloned()?;
        Some(self.attach_downloads(stored).await)
    }

    /// Stage download rows that `create_downloads` will materialize.
    pub async fn stage_downloads(&self, torrent_id: &str, downloads: Vec<Download>) {
        self.staged
            .write()
            .await
            .insert(torrent_id.to_string(), downloads);
    }

    /// Fix the link `unrestrict_link` resolves for a download.
    pub async fn set_link(&self, download_id: &str, link: &str) {
        self.links
            .write()
            .await
            .insert(download_id.to_string(), link.to_string());
    }

    /// Make `unrestrict_link` fail for a download.
    pub async fn fail_unrestrict(&self, download_id: &str, message: &str) {
        self.unrestrict_failures
            .write()
            .await
            .insert(download_id.to_string(), message.to_string());
    }

    /// Make `select_files` fail for a torrent.
    pub async fn fail_select_files(&self, torrent_id: &str, message: &str) {
        self.select_files_failures
            .write()
            .await
            .insert(torrent_id.to_string(), message.to_string());
    }

    /// Make `run_torrent_complete` fail.
    pub fn fail_run_complete(&self, fail: bool) {
        self.fail_run_complete.store(fail, Ordering::SeqCst);
    }

    pub async fn select_files_calls(&self) -> Vec<String> {
        self.select_files_calls.read().await.clone()
    }

    pub async fn create_downloads_calls(&self) -> Vec<String> {
        self.create_downloads_calls.read().await.clone()
    }

    pub async fn retry_calls(&self) -> Vec<(String, u32)> {
        self.retry_calls.read().await.clone()
    }

    pub async fn complete_calls(&self) -> Vec<RecordedComplete> {
        self.complete_calls.read().await.clone()
    }

    pub async fn delete_calls(&self) -> Vec<(String, bool, bool, bool)> {
        self.delete_calls.read().await.clone()
    }

    pub async fn run_complete_calls(&self) -> Vec<String> {
        self.run_complete_calls.read().await.clone()
    }

    pub async fn unrestrict_calls(&self) -> Vec<String> {
        self.unrestrict_calls.read().await.clone()
    }

    async fn attach_downloads(&self, mut torrent: Torrent) -> Torrent {
        torrent.downloads = self.downloads.rows_for(&torrent.id).await;
        torrent
    }

    async fn with_torrent<F>(&self, torrent_id: &str, mutate: F) -> Result<(), TorrentError>
    where
        F: FnOnce(&mut Torrent),
    {
        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .iter_mut()
            .find(|t| t.id == torrent_id)
            .ok_or_else(|| TorrentError::NotFound(torrent_id.to_string()))?;
        mutate(torrent);
        Ok(())
    }
}

#[async_trait]
impl TorrentsFacade for MockTorrentsFacade {
    async fn get(&self) -> Result<Vec<Torrent>, TorrentError> {
        let stored = self.torrents.read().await.clone();
        let mut result = Vec::with_capacity(stored.len());
        for torrent in stored {
            result.push(self.attach_downloads(torrent).await);
        }
        Ok(result)
    }

    async fn unrestrict_link(&self, download_id: &str) -> Result<String, TorrentError> {
        self.unrestrict_calls
            .write()
            .await
            .push(download_id.to_string());

        if let Some(message) = self.unrestrict_failures.read().await.get(download_id) {
            return Err(TorrentError::Provider(message.clone()));
        }

        let link = self
            .links
            .read()
            .await
            .get(download_id)
            .cloned()
            .unwrap_or_else(|| format!("https://dl.example.com/files/{download_id}/video.mkv"));

        // The real facade persists the resolved link on the row.
        let _ = self
            .downloads
            .update_link(download_id, Some(link.clone()))
            .await;

        Ok(link)
    }

    async fn retry_torrent(&self, torrent_id: &str, retry_count: u32) -> Result<(), TorrentError> {
        self.retry_calls
            .write()
            .await
            .push((torrent_id.to_string(), retry_count));
        // Re-submission: clear the marker, consume one retry.
        self.with_torrent(torrent_id, |t| {
            t.retry = None;
            t.retry_count += 1;
            t.completed = None;
            t.error = None;
        })
        .await
    }

    async fn update_retry(
        &self,
        torrent_id: &str,
        retry: Option<DateTime<Utc>>,
        retry_count: u32,
    ) -> Result<(), TorrentError> {
        self.with_torrent(torrent_id, |t| {
            t.retry = retry;
            t.retry_count = retry_count;
        })
        .await
    }

    async fn select_files(&self, torrent_id: &str) -> Result<(), TorrentError> {
        self.select_files_calls
            .write()
            .await
            .push(torrent_id.to_string());
        if let Some(message) = self.select_files_failures.read().await.get(torrent_id) {
            return Err(TorrentError::Provider(message.clone()));
        }
        Ok(())
    }

    async fn update_files_selected(
        &self,
        torrent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TorrentError> {
        self.with_torrent(torrent_id, |t| t.files_selected = Some(at))
            .await
    }

    async fn create_downloads(&self, torrent_id: &str) -> Result<(), TorrentError> {
        self.create_downloads_calls
            .write()
            .await
            .push(torrent_id.to_string());

        let staged = self.staged.write().await.remove(torrent_id);
        if let Some(downloads) = staged {
            for download in downloads {
                self.downloads.insert(download).await;
            }
        }
        Ok(())
    }

    async fn update_error(&self, torrent_id: &str, message: &str) -> Result<(), TorrentError> {
        self.with_torrent(torrent_id, |t| t.error = Some(message.to_string()))
            .await
    }

    async fn update_complete(
        &self,
        torrent_id: &str,
        error: Option<String>,
        at: DateTime<Utc>,
        terminal: bool,
    ) -> Result<(), TorrentError> {
        self.complete_calls.write().await.push(RecordedComplete {
            torrent_id: torrent_id.to_string(),
            error: error.clone(),
            terminal,
        });
        self.with_torrent(torrent_id, |t| {
            t.completed = Some(at);
            t.error = error;
        })
        .await
    }

    async fn delete(
        &self,
        torrent_id: &str,
        remove_remote: bool,
        remove_client: bool,
        remove_files: bool,
    ) -> Result<(), TorrentError> {
        self.delete_calls.write().await.push((
            torrent_id.to_string(),
            remove_remote,
            remove_client,
            remove_files,
        ));
        self.torrents.write().await.retain(|t| t.id != torrent_id);
        self.downloads.remove_torrent_rows(torrent_id).await;
        Ok(())
    }

    async fn run_torrent_complete(&self, torrent_id: &str) -> Result<(), TorrentError> {
        self.run_complete_calls
            .write()
            .await
            .push(torrent_id.to_string());
        if self.fail_run_complete.load(Ordering::SeqCst) {
            return Err(TorrentError::Provider("hook failed".to_string()));
        }
        Ok(())
    }
}
