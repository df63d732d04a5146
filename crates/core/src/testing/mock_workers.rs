//! Mock workers and worker factory for testing.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;

use crate::download::Download;
use crate::torrent::Torrent;
use crate::worker::{
    Aria2Status, DownloadClientKind, DownloadWorker, UnpackWorker, WorkerError, WorkerFactory,
};

/// Controllable mock download worker.
///
/// Tests drive the lifecycle by hand: the worker reports not-finished
/// until `finish_clean`/`finish_with_error` is called, so each tick
/// observes exactly the state the test staged.
pub struct MockDownloadWorker {
    download_id: String,
    kind: DownloadClientKind,
    finished: AtomicBool,
    error: RwLock<Option<String>>,
    remote_id: RwLock<Option<String>>,
    start_failure: RwLock<Option<String>>,
    start_calls: AtomicU32,
    bulk_updates: RwLock<Vec<Aria2Status>>,
}

impl MockDownloadWorker {
    pub fn new(download_id: &str, kind: DownloadClientKind) -> Self {
        Self {
            download_id: download_id.to_string(),
            kind,
            finished: AtomicBool::new(false),
            error: RwLock::new(None),
            remote_id: RwLock::new(Some(format!("remote-{download_id}"))),
            start_failure: RwLock::new(None),
            start_calls: AtomicU32::new(0),
            bulk_updates: RwLock::new(Vec::new()),
        }
    }

    pub fn download_id(&self) -> &str {
        &self.download_id
    }

    /// Report a clean finish on the next sweep.
    pub fn finish_clean(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Report a failed finish on the next sweep.
    pub fn finish_with_error(&self, message: &str) {
        *self.error.write().unwrap() = Some(message.to_string());
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Make `start()` itself fail.
    pub fn fail_start(&self, message: &str) {
        *self.start_failure.write().unwrap() = Some(message.to_string());
    }

    /// Override the remote id `start()` reports.
    pub fn set_remote_id(&self, remote_id: Option<String>) {
        *self.remote_id.write().unwrap() = remote_id;
    }

    /// How many times `start()` was invoked.
    pub fn start_count(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// How many bulk statuses this worker received, in total.
    pub fn bulk_update_count(&self) -> usize {
        self.bulk_updates.read().unwrap().len()
    }
}

#[async_trait]
impl DownloadWorker for MockDownloadWorker {
    fn kind(&self) -> DownloadClientKind {
        self.kind
    }

    fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn error(&self) -> Option<String> {
        self.error.read().unwrap().clone()
    }

    async fn start(&self) -> Result<Option<String>, WorkerError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.start_failure.read().unwrap().clone() {
            return Err(WorkerError::Failed(message));
        }
        Ok(self.remote_id.read().unwrap().clone())
    }

    fn update_status(&self, statuses: &[Aria2Status]) {
        self.bulk_updates
            .write()
            .unwrap()
            .extend(statuses.iter().cloned());
    }
}

/// Controllable mock unpack worker.
pub struct MockUnpackWorker {
    download_id: String,
    finished: AtomicBool,
    error: RwLock<Option<String>>,
    start_failure: RwLock<Option<String>>,
    start_calls: AtomicU32,
}

impl MockUnpackWorker {
    pub fn new(download_id: &str) -> Self {
        Self {
            download_id: download_id.to_string(),
            finished: AtomicBool::new(false),
            error: RwLock::new(None),
            start_failure: RwLock::new(None),
            start_calls: AtomicU32::new(0),
        }
    }

    pub fn download_id(&self) -> &str {
        &self.download_id
    }

    pub fn finish_clean(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn finish_with_error(&self, message: &str) {
        *self.error.write().unwrap() = Some(message.to_string());
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_failure.write().unwrap() = Some(message.to_string());
    }

    pub fn start_count(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnpackWorker for MockUnpackWorker {
    fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn error(&self) -> Option<String> {
        self.error.read().unwrap().clone()
    }

    async fn start(&self) -> Result<(), WorkerError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.start_failure.read().unwrap().clone() {
            return Err(WorkerError::Failed(message));
        }
        Ok(())
    }
}

/// Mock worker factory.
///
/// Records every construction (with its instant, for rate-limit
/// assertions) and hands the created mocks back to the test so it can
/// drive their lifecycle.
pub struct MockWorkerFactory {
    kind: RwLock<DownloadClientKind>,
    download_workers: RwLock<Vec<Arc<MockDownloadWorker>>>,
    unpack_workers: RwLock<Vec<Arc<MockUnpackWorker>>>,
    download_starts: RwLock<Vec<Instant>>,
}

impl Default for MockWorkerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorkerFactory {
    pub fn new() -> Self {
        Self {
            kind: RwLock::new(DownloadClientKind::Internal),
            download_workers: RwLock::new(Vec::new()),
            unpack_workers: RwLock::new(Vec::new()),
            download_starts: RwLock::new(Vec::new()),
        }
    }

    /// Change the kind newly built download workers report.
    pub fn set_kind(&self, kind: DownloadClientKind) {
        *self.kind.write().unwrap() = kind;
    }

    /// Every download worker built so far, in construction order.
    pub fn download_workers(&self) -> Vec<Arc<MockDownloadWorker>> {
        self.download_workers.read().unwrap().clone()
    }

    /// Every unpack worker built so far, in construction order.
    pub fn unpack_workers(&self) -> Vec<Arc<MockUnpackWorker>> {
        self.unpack_workers.read().unwrap().clone()
    }

    /// The most recent download worker built for a download.
    pub fn download_worker_for(&self, download_id: &str) -> Option<Arc<MockDownloadWorker>> {
        self.download_workers
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|w| w.download_id() == download_id)
            .cloned()
    }

    /// Construction instants of the download workers, for rate-limit
    /// assertions.
    pub fn download_start_times(&self) -> Vec<Instant> {
        self.download_starts.read().unwrap().clone()
    }
}

impl WorkerFactory for MockWorkerFactory {
    fn download_worker(
        &self,
        download: &Download,
        _torrent: &Torrent,
        _target_dir: &Path,
    ) -> Arc<dyn DownloadWorker> {
        let worker = Arc::new(MockDownloadWorker::new(
            &download.id,
            *self.kind.read().unwrap(),
        ));
        self.download_workers
            .write()
            .unwrap()
            .push(Arc::clone(&worker));
        self.download_starts.write().unwrap().push(Instant::now());
        worker
    }

    fn unpack_worker(
        &self,
        download: &Download,
        _torrent: &Torrent,
        _target_dir: &Path,
    ) -> Arc<dyn UnpackWorker> {
        let worker = Arc::new(MockUnpackWorker::new(&download.id));
        self.unpack_workers
            .write()
            .unwrap()
            .push(Arc::clone(&worker));
        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_download_worker_lifecycle() {
        let worker = MockDownloadWorker::new("d1", DownloadClientKind::Internal);
        assert!(!worker.finished());
        assert!(worker.error().is_none());

        let remote_id = worker.start().await.unwrap();
        assert_eq!(remote_id.as_deref(), Some("remote-d1"));
        assert_eq!(worker.start_count(), 1);

        worker.finish_with_error("disk full");
        assert!(worker.finished());
        assert_eq!(worker.error().as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_start_failure_injection() {
        let worker = MockDownloadWorker::new("d1", DownloadClientKind::Internal);
        worker.fail_start("no route to host");

        let result = worker.start().await;
        assert!(matches!(result, Err(WorkerError::Failed(_))));
        assert_eq!(worker.start_count(), 1);
    }

    #[test]
    fn test_factory_records_constructions() {
        let factory = MockWorkerFactory::new();
        let torrent = fixtures::torrent("t1");
        let download = fixtures::queued_download("d1", "t1");

        let built = factory.download_worker(&download, &torrent, Path::new("/downloads"));
        assert_eq!(built.kind(), DownloadClientKind::Internal);
        assert_eq!(factory.download_workers().len(), 1);
        assert!(factory.download_worker_for("d1").is_some());
        assert!(factory.download_worker_for("d2").is_none());

        factory.set_kind(DownloadClientKind::Aria2c);
        let built = factory.download_worker(&download, &torrent, Path::new("/downloads"));
        assert_eq!(built.kind(), DownloadClientKind::Aria2c);
    }
}
