//! In-memory registries of running workers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::worker::{DownloadWorker, UnpackWorker};

/// The single owner of the two active-worker maps: `download_id` to its
/// running download worker, and `download_id` to its running unpack
/// worker. The two maps are disjoint by id at any instant, because a
/// download only queues for unpack after its transfer was swept out.
///
/// Snapshots clone the map under the read lock, so callers iterate a
/// consistent view while workers keep registering and finishing.
#[derive(Default)]
pub struct ActiveRegistry {
    downloads: RwLock<HashMap<String, Arc<dyn DownloadWorker>>>,
    unpacks: RwLock<HashMap<String, Arc<dyn UnpackWorker>>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_download(&self, download_id: String, worker: Arc<dyn DownloadWorker>) {
        self.downloads.write().await.insert(download_id, worker);
    }

    pub async fn remove_download(&self, download_id: &str) -> Option<Arc<dyn DownloadWorker>> {
        self.downloads.write().await.remove(download_id)
    }

    pub async fn contains_download(&self, download_id: &str) -> bool {
        self.downloads.read().await.contains_key(download_id)
    }

    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    pub async fn download_snapshot(&self) -> Vec<(String, Arc<dyn DownloadWorker>)> {
        self.downloads
            .read()
            .await
            .iter()
            .map(|(id, worker)| (id.clone(), Arc::clone(worker)))
            .collect()
    }

    pub async fn insert_unpack(&self, download_id: String, worker: Arc<dyn UnpackWorker>) {
        self.unpacks.write().await.insert(download_id, worker);
    }

    pub async fn remove_unpack(&self, download_id: &str) -> Option<Arc<dyn UnpackWorker>> {
        self.unpacks.write().await.remove(download_id)
    }

    pub async fn contains_unpack(&self, download_id: &str) -> bool {
        self.unpacks.read().await.contains_key(download_id)
    }

    pub async fn unpack_count(&self) -> usize {
        self.unpacks.read().await.len()
    }

    pub async fn unpack_snapshot(&self) -> Vec<(String, Arc<dyn UnpackWorker>)> {
        self.unpacks
            .read()
            .await
            .iter()
            .map(|(id, worker)| (id.clone(), Arc::clone(worker)))
            .collect()
    }
}
