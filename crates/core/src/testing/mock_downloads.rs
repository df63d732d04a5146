//! Mock download store for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::download::{Download, DownloadError, DownloadStore};

/// In-memory implementation of the [`DownloadStore`] trait.
#[derive(Default)]
pub struct MockDownloadStore {
    rows: RwLock<HashMap<String, Download>>,
}

impl MockDownloadStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a download row.
    pub async fn insert(&self, download: Download) {
        self.rows.write().await.insert(download.id.clone(), download);
    }

    /// Read a single row.
    pub async fn row(&self, download_id: &str) -> Option<Download> {
        self.rows.read().await.get(download_id).cloned()
    }

    /// All rows, ordered by queue time then id so tests see a stable
    /// ordering.
    pub async fn all(&self) -> Vec<Download> {
        let mut rows: Vec<Download> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.download_queued
                .cmp(&b.download_queued)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    /// Rows belonging to one torrent, in the same stable order.
    pub async fn rows_for(&self, torrent_id: &str) -> Vec<Download> {
        self.all()
            .await
            .into_iter()
            .filter(|d| d.torrent_id == torrent_id)
            .collect()
    }

    /// Persist a resolved link; the real facade does this as part of
    /// unrestricting.
    pub async fn update_link(
        &self,
        download_id: &str,
        link: Option<String>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.link = link).await
    }

    /// Drop every row belonging to a torrent.
    pub async fn remove_torrent_rows(&self, torrent_id: &str) {
        self.rows
            .write()
            .await
            .retain(|_, d| d.torrent_id != torrent_id);
    }

    async fn with_row<F>(&self, download_id: &str, mutate: F) -> Result<(), DownloadError>
    where
        F: FnOnce(&mut Download),
    {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(download_id)
            .ok_or_else(|| DownloadError::NotFound(download_id.to_string()))?;
        mutate(row);
        Ok(())
    }
}

#[async_trait]
impl DownloadStore for MockDownloadStore {
    async fn get(&self, download_id: &str) -> Result<Option<Download>, DownloadError> {
        Ok(self.rows.read().await.get(download_id).cloned())
    }

    async fn update_download_started(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.download_started = at).await
    }

    async fn update_download_finished(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.download_finished = at)
            .await
    }

    async fn update_unpacking_queued(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.unpacking_queued = at).await
    }

    async fn update_unpacking_started(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.unpacking_started = at)
            .await
    }

    async fn update_unpacking_finished(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.unpacking_finished = at)
            .await
    }

    async fn update_completed(
        &self,
        download_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.completed = at).await
    }

    async fn update_error(
        &self,
        download_id: &str,
        message: Option<String>,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.error = message).await
    }

    async fn update_retry_count(
        &self,
        download_id: &str,
        count: u32,
    ) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| d.retry_count = count).await
    }

    async fn reset(&self, download_id: &str) -> Result<(), DownloadError> {
        self.with_row(download_id, |d| {
            d.download_started = None;
            d.download_finished = None;
            d.unpacking_queued = None;
            d.unpacking_started = None;
            d.unpacking_finished = None;
            d.completed = None;
            d.error = None;
        })
        .await
    }

    async fn update_remote_id_batch(
        &self,
        remote_ids: HashMap<String, String>,
    ) -> Result<(), DownloadError> {
        let mut rows = self.rows.write().await;
        for (download_id, remote_id) in remote_ids {
            if let Some(row) = rows.get_mut(&download_id) {
                row.remote_id = Some(remote_id);
            }
        }
        Ok(())
    }

    async fn update_error_batch(
        &self,
        errors: HashMap<String, String>,
    ) -> Result<(), DownloadError> {
        let mut rows = self.rows.write().await;
        for (download_id, message) in errors {
            if let Some(row) = rows.get_mut(&download_id) {
                row.error = Some(message);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_update_and_reset() {
        let store = MockDownloadStore::new();
        store.insert(fixtures::queued_download("d1", "t1")).await;

        let now = Utc::now();
        store.update_download_started("d1", Some(now)).await.unwrap();
        store.update_error("d1", Some("boom".to_string())).await.unwrap();

        let row = store.row("d1").await.unwrap();
        assert_eq!(row.download_started, Some(now));
        assert_eq!(row.error.as_deref(), Some("boom"));

        store.reset("d1").await.unwrap();
        let row = store.row("d1").await.unwrap();
        assert!(row.download_started.is_none());
        assert!(row.error.is_none());
        // The queue stamp survives a reset.
        assert!(row.download_queued.is_some());
    }

    #[tokio::test]
    async fn test_missing_row_is_not_found() {
        let store = MockDownloadStore::new();
        let result = store.update_completed("ghost", Some(Utc::now())).await;
        assert!(matches!(result, Err(DownloadError::NotFound(_))));
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_updates() {
        let store = MockDownloadStore::new();
        store.insert(fixtures::queued_download("d1", "t1")).await;
        store.insert(fixtures::queued_download("d2", "t1")).await;

        let mut remote_ids = HashMap::new();
        remote_ids.insert("d1".to_string(), "gid-1".to_string());
        remote_ids.insert("missing".to_string(), "gid-x".to_string());
        store.update_remote_id_batch(remote_ids).await.unwrap();

        assert_eq!(
            store.row("d1").await.unwrap().remote_id.as_deref(),
            Some("gid-1")
        );
        assert!(store.row("d2").await.unwrap().remote_id.is_none());
    }
}
