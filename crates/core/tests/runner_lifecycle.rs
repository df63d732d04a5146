//! Runner lifecycle integration tests.
//!
//! These tests drive a real `TorrentRunner` against mock collaborators,
//! one explicit tick at a time, and verify the complete torrent
//! lifecycle: file selection -> download creation -> worker start ->
//! sweep -> unpack -> completion -> retention.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use debrix_core::{
    testing::{
        fixtures, MockBulkStatusClient, MockDownloadStore, MockProgressReporter,
        MockTorrentsFacade, MockWorkerFactory,
    },
    ActiveRegistry, Config, Download, DownloadClientKind, FinishedAction, HostDownloadAction,
    RdStatus, TorrentRunner,
};

/// Test helper wiring every mock collaborator to a real runner.
struct TestHarness {
    config: Arc<RwLock<Config>>,
    torrents: Arc<MockTorrentsFacade>,
    downloads: Arc<MockDownloadStore>,
    factory: Arc<MockWorkerFactory>,
    bulk: Arc<MockBulkStatusClient>,
    progress: Arc<MockProgressReporter>,
    registry: Arc<ActiveRegistry>,
    runner: TorrentRunner,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(base_config())
    }

    fn with_config(config: Config) -> Self {
        let config = Arc::new(RwLock::new(config));
        let downloads = Arc::new(MockDownloadStore::new());
        let torrents = Arc::new(MockTorrentsFacade::new(Arc::clone(&downloads)));
        let factory = Arc::new(MockWorkerFactory::new());
        let bulk = Arc::new(MockBulkStatusClient::new());
        let progress = Arc::new(MockProgressReporter::new());
        let registry = Arc::new(ActiveRegistry::new());

        let runner = TorrentRunner::new(
            Arc::clone(&config),
            Arc::clone(&torrents) as Arc<dyn debrix_core::TorrentsFacade>,
            Arc::clone(&downloads) as Arc<dyn debrix_core::DownloadStore>,
            Arc::clone(&factory) as Arc<dyn debrix_core::WorkerFactory>,
            Some(Arc::clone(&bulk) as Arc<dyn debrix_core::BulkStatusClient>),
            Arc::clone(&progress) as Arc<dyn debrix_core::ProgressReporter>,
            Arc::clone(&registry),
        );

        Self {
            config,
            torrents,
            downloads,
            factory,
            bulk,
            progress,
            registry,
            runner,
        }
    }

    async fn tick(&self) {
        self.runner.tick().await;
        self.assert_invariants().await;
    }

    /// The universal invariants that must hold after every tick.
    async fn assert_invariants(&self) {
        let config = self.config.read().await.clone();
        let download_limit = config.general.download_limit.max(1) as usize;
        let unpack_limit = config.general.unpack_limit.max(1) as usize;

        assert!(
            self.registry.download_count().await <= download_limit,
            "download registry exceeds its cap"
        );
        assert!(
            self.registry.unpack_count().await <= unpack_limit,
            "unpack registry exceeds its cap"
        );

        for (download_id, _) in self.registry.download_snapshot().await {
            let row = self
                .downloads
                .row(&download_id)
                .await
                .expect("download registry entry without a row");
            assert!(row.completed.is_none(), "completed row in download registry");
            assert!(row.error.is_none(), "errored row in download registry");
            self.assert_parent_not_completed(&row).await;
        }
        for (download_id, _) in self.registry.unpack_snapshot().await {
            let row = self
                .downloads
                .row(&download_id)
                .await
                .expect("unpack registry entry without a row");
            assert!(row.completed.is_none(), "completed row in unpack registry");
            assert!(row.error.is_none(), "errored row in unpack registry");
            assert!(
                !self.registry.contains_download(&download_id).await,
                "download in both registries"
            );
            self.assert_parent_not_completed(&row).await;
        }

        for row in self.downloads.all().await {
            assert_stage_order(&row);
        }
    }

    async fn assert_parent_not_completed(&self, row: &Download) {
        if let Some(torrent) = self.torrents.torrent(&row.torrent_id).await {
            assert!(
                torrent.completed.is_none(),
                "completed torrent still has an active worker"
            );
        }
    }

    async fn row(&self, download_id: &str) -> Download {
        self.downloads
            .row(download_id)
            .await
            .expect("download row missing")
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.provider.api_key = "test-key".to_string();
    config.download_client.download_path = "/downloads".to_string();
    config
}

/// Stage-timestamp monotonicity: every set pair respects the order
/// queued <= started <= finished <= unpack-queued <= unpack-started <=
/// unpack-finished <= completed.
fn assert_stage_order(download: &Download) {
    let stages: Vec<Option<DateTime<Utc>>> = vec![
        download.download_queued,
        download.download_started,
        download.download_finished,
        download.unpacking_queued,
        download.unpacking_started,
        download.unpacking_finished,
        download.completed,
    ];
    let set: Vec<DateTime<Utc>> = stages.into_iter().flatten().collect();
    for pair in set.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "stage timestamps out of order on download {}",
            download.id
        );
    }
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[tokio::test]
async fn test_happy_path_single_file() {
    let harness = TestHarness::new();

    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;
    harness
        .torrents
        .stage_downloads("t1", vec![fixtures::queued_download("d1", "t1")])
        .await;

    // Tick 1: file selection.
    harness.tick().await;
    assert_eq!(harness.torrents.select_files_calls().await, vec!["t1"]);
    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.files_selected.is_some());
    assert!(harness.torrents.create_downloads_calls().await.is_empty());

    // Tick 2: downloads are materialized.
    harness.tick().await;
    assert_eq!(harness.torrents.create_downloads_calls().await, vec!["t1"]);
    assert_eq!(harness.downloads.rows_for("t1").await.len(), 1);

    // Tick 3: the link is unrestricted and a worker starts.
    harness.tick().await;
    assert_eq!(harness.torrents.unrestrict_calls().await, vec!["d1"]);
    let row = harness.row("d1").await;
    assert!(row.download_started.is_some());
    assert!(row.link.as_deref().unwrap().ends_with(".mkv"));
    assert_eq!(row.remote_id.as_deref(), Some("remote-d1"));
    assert_eq!(harness.registry.download_count().await, 1);

    let worker = harness.factory.download_worker_for("d1").unwrap();
    assert_eq!(worker.start_count(), 1);

    // Tick 4: the finished transfer queues for unpacking.
    worker.finish_clean();
    harness.tick().await;
    let row = harness.row("d1").await;
    assert!(row.download_finished.is_some());
    assert_eq!(row.unpacking_queued, row.download_finished);
    assert_eq!(harness.registry.download_count().await, 0);

    // Tick 5: .mkv needs no unpack, the whole stage closes at once.
    harness.tick().await;
    let row = harness.row("d1").await;
    assert!(row.completed.is_some());
    assert_eq!(row.unpacking_started, row.unpacking_finished);
    assert_eq!(row.unpacking_finished, row.completed);
    assert!(harness.factory.unpack_workers().is_empty());

    // Tick 6: every child is terminal, the torrent completes cleanly.
    harness.tick().await;
    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.completed.is_some());
    assert!(torrent.error.is_none());
    assert!(harness.torrents.delete_calls().await.is_empty());
    assert_eq!(harness.torrents.run_complete_calls().await, vec!["t1"]);

    let completes = harness.torrents.complete_calls().await;
    assert_eq!(completes.len(), 1);
    assert!(completes[0].error.is_none());
    assert!(completes[0].terminal);
}

#[tokio::test]
async fn test_download_retry_then_give_up() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    torrent.download_retry_attempts = 2;
    harness.torrents.insert_torrent(torrent).await;
    harness
        .downloads
        .insert(fixtures::linked_download(
            "d1",
            "t1",
            "https://dl.example.com/files/d1/video.mkv",
        ))
        .await;

    // Three worker generations: two resets, then terminal failure.
    for attempt in 0..3u32 {
        harness.tick().await;
        let workers = harness.factory.download_workers();
        assert_eq!(workers.len() as u32, attempt + 1, "one worker per attempt");
        workers.last().unwrap().finish_with_error("connection reset");

        harness.tick().await;
        let row = harness.row("d1").await;
        if attempt < 2 {
            assert_eq!(row.retry_count, attempt + 1);
            assert!(row.error.is_none());
            assert!(row.download_started.is_none(), "reset rewinds the start");
            assert!(row.completed.is_none());
        } else {
            assert_eq!(row.retry_count, 2);
            assert_eq!(row.error.as_deref(), Some("connection reset"));
            assert!(row.completed.is_some());
        }
    }

    // No fourth worker is ever created.
    harness.tick().await;
    let workers = harness.factory.download_workers();
    assert_eq!(workers.len(), 3);
    let total_starts: u32 = workers.iter().map(|w| w.start_count()).sum();
    assert_eq!(total_starts, 3, "retry budget law: at most k + 1 starts");
}

#[tokio::test]
async fn test_download_cap_enforcement_and_rate_limit() {
    let mut config = base_config();
    config.general.download_limit = 3;
    let harness = TestHarness::with_config(config);

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;
    for i in 1..=5 {
        let id = format!("d{i}");
        let mut download = fixtures::linked_download(
            &id,
            "t1",
            &format!("https://dl.example.com/files/{id}/part{i}.mkv"),
        );
        download.download_queued = Some(Utc::now() - chrono::Duration::minutes(10 - i));
        harness.downloads.insert(download).await;
    }

    // Tick 1: exactly three starts, oldest first, 100ms apart.
    harness.tick().await;
    assert_eq!(harness.registry.download_count().await, 3);
    for id in ["d1", "d2", "d3"] {
        assert!(harness.row(id).await.download_started.is_some());
    }
    for id in ["d4", "d5"] {
        assert!(harness.row(id).await.download_started.is_none());
    }

    let times = harness.factory.download_start_times();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        assert!(
            pair[1].duration_since(pair[0]) >= Duration::from_millis(100),
            "starts within one torrent must be at least 100ms apart"
        );
    }

    // A slot freed by the sweep is usable for the next queued download.
    harness
        .factory
        .download_worker_for("d1")
        .unwrap()
        .finish_clean();
    harness.tick().await;
    assert_eq!(harness.registry.download_count().await, 3);
    assert!(harness.row("d4").await.download_started.is_some());
    assert!(harness.row("d5").await.download_started.is_none());
}

#[tokio::test]
async fn test_symlink_mode_rejects_unpack() {
    let mount = tempfile::TempDir::new().unwrap();
    let mut config = base_config();
    config.download_client.client = DownloadClientKind::Symlink;
    config.download_client.rclone_mount_path =
        Some(mount.path().to_string_lossy().into_owned());
    let harness = TestHarness::with_config(config);

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;

    let mut download =
        fixtures::linked_download("d1", "t1", "https://dl.example.com/files/d1/release.rar");
    let done = Utc::now();
    download.download_started = Some(done);
    download.download_finished = Some(done);
    download.unpacking_queued = Some(done);
    harness.downloads.insert(download).await;

    harness.tick().await;

    let row = harness.row("d1").await;
    assert_eq!(
        row.error.as_deref(),
        Some("Will not unzip with SymlinkDownloader!")
    );
    assert!(row.completed.is_some());
    assert!(row.unpacking_started.is_none());
    assert!(harness.factory.unpack_workers().is_empty());
}

#[tokio::test]
async fn test_lifetime_expiry() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.lifetime = 10;
    torrent.added = Utc::now() - chrono::Duration::minutes(11);
    torrent.torrent_retry_attempts = 3;
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.completed.is_some());
    assert_eq!(
        torrent.error.as_deref(),
        Some("Torrent lifetime of 10 minutes reached")
    );
    assert_eq!(torrent.retry_count, 3, "the retry budget is burned");
    assert!(torrent.retry.is_none());
}

#[tokio::test]
async fn test_lifetime_not_expired_before_deadline() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.lifetime = 10;
    torrent.added = Utc::now() - chrono::Duration::minutes(9);
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.completed.is_none());
    assert!(torrent.error.is_none());
}

#[tokio::test]
async fn test_error_ttl_delete() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.error = Some("provider rejected the magnet".to_string());
    torrent.delete_on_error = 5;
    torrent.completed = Some(Utc::now() - chrono::Duration::minutes(6));
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    assert_eq!(
        harness.torrents.delete_calls().await,
        vec![("t1".to_string(), true, true, true)]
    );
    assert!(harness.torrents.torrent("t1").await.is_none());

    // The row is gone; later ticks have nothing to delete.
    harness.tick().await;
    assert_eq!(harness.torrents.delete_calls().await.len(), 1);
}

// =============================================================================
// Laws
// =============================================================================

#[tokio::test]
async fn test_finish_action_flag_triples() {
    let harness = TestHarness::new();

    let cases = [
        ("t_none", FinishedAction::None),
        ("t_all", FinishedAction::RemoveAllTorrents),
        ("t_rd", FinishedAction::RemoveRealDebrid),
        ("t_client", FinishedAction::RemoveClient),
    ];
    for (id, action) in &cases {
        let mut torrent = fixtures::finished_torrent(id);
        torrent.files_selected = Some(Utc::now());
        torrent.host_download_action = HostDownloadAction::DownloadNone;
        torrent.finished_action = *action;
        harness.torrents.insert_torrent(torrent).await;
    }

    harness.tick().await;

    let deletes = harness.torrents.delete_calls().await;
    assert_eq!(deletes.len(), 3, "FinishedAction::None deletes nothing");
    assert!(deletes.contains(&("t_all".to_string(), true, true, false)));
    assert!(deletes.contains(&("t_rd".to_string(), false, true, false)));
    assert!(deletes.contains(&("t_client".to_string(), true, false, false)));

    let mut hooks = harness.torrents.run_complete_calls().await;
    hooks.sort();
    assert_eq!(hooks, vec!["t_all", "t_client", "t_none", "t_rd"]);
}

#[tokio::test]
async fn test_initializer_rewinds_in_flight_stages_idempotently() {
    let harness = TestHarness::new();

    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;

    // In-flight download: started but never finished.
    let mut in_flight = fixtures::queued_download("d1", "t1");
    in_flight.download_started = Some(Utc::now());
    harness.downloads.insert(in_flight).await;

    // In-flight unpack: started but never finished.
    let mut unpacking = fixtures::queued_download("d2", "t1");
    let done = Utc::now();
    unpacking.download_started = Some(done);
    unpacking.download_finished = Some(done);
    unpacking.unpacking_queued = Some(done);
    unpacking.unpacking_started = Some(done);
    harness.downloads.insert(unpacking).await;

    // Failed download: left alone.
    let mut failed = fixtures::queued_download("d3", "t1");
    failed.download_started = Some(done);
    failed.error = Some("boom".to_string());
    harness.downloads.insert(failed).await;

    harness.runner.initialize().await.unwrap();

    assert!(harness.row("d1").await.download_started.is_none());
    let d2 = harness.row("d2").await;
    assert!(d2.unpacking_started.is_none());
    assert!(d2.download_started.is_some(), "finished stages keep their stamps");
    assert!(harness.row("d3").await.download_started.is_some());

    // Running the sweep again changes nothing.
    let before = harness.downloads.all().await;
    harness.runner.initialize().await.unwrap();
    let after = harness.downloads.all().await;
    assert_eq!(
        serde_json::to_value(&before).unwrap(),
        serde_json::to_value(&after).unwrap()
    );
}

// =============================================================================
// Reconciliation details
// =============================================================================

#[tokio::test]
async fn test_remote_error_completes_torrent_with_raw_status() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.rd_status = RdStatus::Error;
    torrent.rd_status_raw = "magnet_error".to_string();
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.completed.is_some());
    assert_eq!(torrent.error.as_deref(), Some("magnet_error"));
    assert!(harness.torrents.select_files_calls().await.is_empty());
}

#[tokio::test]
async fn test_reconciliation_error_fails_its_torrent_and_the_tick_moves_on() {
    let harness = TestHarness::new();

    // t1 blows up during file selection; t2 is healthy.
    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;
    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t2"))
        .await;
    harness
        .torrents
        .fail_select_files("t1", "provider exploded")
        .await;

    harness.tick().await;

    let t1 = harness.torrents.torrent("t1").await.unwrap();
    assert!(t1.completed.is_some());
    assert!(
        t1.error.as_deref().unwrap().contains("provider exploded"),
        "the step's error becomes the torrent's terminal error"
    );

    // Contained failures are recorded as non-terminal, so a retry
    // request can still resurrect the torrent.
    let completes = harness.torrents.complete_calls().await;
    let recorded = completes.iter().find(|c| c.torrent_id == "t1").unwrap();
    assert!(!recorded.terminal);

    // The sibling torrent was still reconciled on the same tick.
    let t2 = harness.torrents.torrent("t2").await.unwrap();
    assert!(t2.files_selected.is_some());
    assert!(t2.completed.is_none());
    assert!(t2.error.is_none());
    assert_eq!(harness.torrents.select_files_calls().await, vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_unrestrict_failure_terminates_download_and_stops_the_loop() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;

    let mut first = fixtures::queued_download("d1", "t1");
    first.download_queued = Some(Utc::now() - chrono::Duration::minutes(2));
    harness.downloads.insert(first).await;
    harness
        .downloads
        .insert(fixtures::queued_download("d2", "t1"))
        .await;
    harness.torrents.fail_unrestrict("d1", "hoster is down").await;

    harness.tick().await;

    let d1 = harness.row("d1").await;
    assert_eq!(d1.error.as_deref(), Some("hoster is down"));
    assert!(d1.completed.is_some());
    assert!(d1.download_started.is_none());

    // The loop broke: the second download was not even attempted.
    assert_eq!(harness.torrents.unrestrict_calls().await, vec!["d1"]);
    assert!(harness.row("d2").await.download_started.is_none());
    assert!(harness.factory.download_workers().is_empty());
}

#[tokio::test]
async fn test_unpack_requires_a_link() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;

    let mut download = fixtures::queued_download("d1", "t1");
    let done = Utc::now();
    download.download_started = Some(done);
    download.download_finished = Some(done);
    download.unpacking_queued = Some(done);
    harness.downloads.insert(download).await;

    harness.tick().await;

    let row = harness.row("d1").await;
    assert_eq!(row.error.as_deref(), Some("Download Link cannot be null"));
    assert!(row.completed.is_some());
}

#[tokio::test]
async fn test_unpack_cap_skips_archives_but_still_passes_plain_files() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;

    let done = Utc::now();
    for (i, name) in ["one.rar", "two.rar", "three.mkv"].iter().enumerate() {
        let id = format!("d{}", i + 1);
        let mut download = fixtures::linked_download(
            &id,
            "t1",
            &format!("https://dl.example.com/files/{id}/{name}"),
        );
        download.download_queued = Some(done - chrono::Duration::minutes(3 - i as i64));
        download.download_started = Some(done);
        download.download_finished = Some(done);
        download.unpacking_queued = Some(done);
        harness.downloads.insert(download).await;
    }

    // unpack_limit defaults to 1: the first archive takes the slot, the
    // second is deferred, and the plain file behind it still skips
    // through the stage on the same tick.
    harness.tick().await;

    let unpack_workers = harness.factory.unpack_workers();
    assert_eq!(unpack_workers.len(), 1);
    assert_eq!(unpack_workers[0].download_id(), "d1");
    assert!(harness.row("d1").await.unpacking_started.is_some());

    assert!(harness.row("d2").await.unpacking_started.is_none());

    let plain = harness.row("d3").await;
    assert!(plain.completed.is_some());
    assert_eq!(plain.unpacking_started, plain.unpacking_finished);
}

#[tokio::test]
async fn test_unpack_worker_error_is_terminal() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    torrent.download_retry_attempts = 5;
    harness.torrents.insert_torrent(torrent).await;

    let mut download =
        fixtures::linked_download("d1", "t1", "https://dl.example.com/files/d1/release.rar");
    let done = Utc::now();
    download.download_started = Some(done);
    download.download_finished = Some(done);
    download.unpacking_queued = Some(done);
    harness.downloads.insert(download).await;

    harness.tick().await;
    // Unpack starts are fire-and-forget; let the spawned task run.
    tokio::task::yield_now().await;
    let worker = harness.factory.unpack_workers().pop().unwrap();
    assert_eq!(worker.start_count(), 1);

    // No retry budget applies to unpacking, whatever the parent allows.
    worker.finish_with_error("corrupt archive");
    harness.tick().await;

    let row = harness.row("d1").await;
    assert_eq!(row.error.as_deref(), Some("corrupt archive"));
    assert!(row.completed.is_some());
    assert_eq!(row.retry_count, 0);
    assert_eq!(harness.registry.unpack_count().await, 0);

    harness.tick().await;
    assert_eq!(harness.factory.unpack_workers().len(), 1, "no second attempt");
}

#[tokio::test]
async fn test_torrent_retry_delegates_to_facade() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.retry = Some(Utc::now());
    torrent.retry_count = 1;
    torrent.torrent_retry_attempts = 2;
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    // The facade re-submits and owns the increment.
    assert_eq!(harness.torrents.retry_calls().await, vec![("t1".to_string(), 1)]);
    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.retry.is_none());
    assert_eq!(torrent.retry_count, 2);
}

#[tokio::test]
async fn test_torrent_retry_cap_reached_clears_marker() {
    let harness = TestHarness::new();

    let mut torrent = fixtures::torrent("t1");
    torrent.retry = Some(Utc::now());
    torrent.retry_count = 3;
    torrent.torrent_retry_attempts = 2;
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    assert!(harness.torrents.retry_calls().await.is_empty());
    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.retry.is_none());
    assert_eq!(torrent.retry_count, 3, "the count is the cap-reached signal");
}

#[tokio::test]
async fn test_bulk_status_reaches_only_aria2_workers() {
    let mut config = base_config();
    config.general.download_limit = 2;
    let harness = TestHarness::with_config(config);
    harness.factory.set_kind(DownloadClientKind::Aria2c);

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;
    for id in ["d1", "d2"] {
        harness
            .downloads
            .insert(fixtures::linked_download(
                id,
                "t1",
                &format!("https://dl.example.com/files/{id}/video.mkv"),
            ))
            .await;
    }

    // Tick 1 starts the workers; the registry was empty when the poll
    // phase ran, so no bulk call yet.
    harness.tick().await;
    assert_eq!(harness.registry.download_count().await, 2);
    assert_eq!(harness.bulk.call_count(), 0);

    let statuses: Vec<debrix_core::Aria2Status> = serde_json::from_str(
        r#"[
            {"gid": "remote-d1", "status": "active", "totalLength": "1000", "completedLength": "500"},
            {"gid": "remote-d2", "status": "active", "totalLength": "2000", "completedLength": "0"}
        ]"#,
    )
    .unwrap();
    harness.bulk.set_statuses(statuses).await;

    // Tick 2: one bulk query, fanned out to every aria2 worker.
    harness.tick().await;
    assert_eq!(harness.bulk.call_count(), 1);
    for worker in harness.factory.download_workers() {
        assert_eq!(worker.bulk_update_count(), 2);
    }
}

#[tokio::test]
async fn test_failed_hook_does_not_fail_the_torrent() {
    let harness = TestHarness::new();
    harness.torrents.fail_run_complete(true);

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    torrent.host_download_action = HostDownloadAction::DownloadNone;
    harness.torrents.insert_torrent(torrent).await;

    harness.tick().await;

    let torrent = harness.torrents.torrent("t1").await.unwrap();
    assert!(torrent.completed.is_some());
    assert!(torrent.error.is_none(), "hook failures are log-only");
    assert_eq!(harness.torrents.run_complete_calls().await, vec!["t1"]);
}

// =============================================================================
// Configuration gates
// =============================================================================

#[tokio::test]
async fn test_tick_is_a_noop_without_api_key() {
    let mut config = base_config();
    config.provider.api_key = String::new();
    let harness = TestHarness::with_config(config);

    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;

    harness.tick().await;

    assert!(harness.torrents.select_files_calls().await.is_empty());
    assert_eq!(harness.progress.update_count(), 0);
}

#[tokio::test]
async fn test_tick_is_a_noop_without_download_path() {
    let mut config = base_config();
    config.download_client.download_path = String::new();
    let harness = TestHarness::with_config(config);

    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;

    harness.tick().await;

    assert!(harness.torrents.select_files_calls().await.is_empty());
}

#[tokio::test]
async fn test_tick_is_a_noop_when_symlink_mount_is_missing() {
    let mut config = base_config();
    config.download_client.client = DownloadClientKind::Symlink;
    config.download_client.rclone_mount_path = Some("/definitely/not/mounted".to_string());
    let harness = TestHarness::with_config(config);

    harness
        .torrents
        .insert_torrent(fixtures::finished_torrent("t1"))
        .await;

    harness.tick().await;

    assert!(harness.torrents.select_files_calls().await.is_empty());
}

#[tokio::test]
async fn test_limits_below_one_are_clamped_not_fatal() {
    let mut config = base_config();
    config.general.download_limit = 0;
    config.general.unpack_limit = -1;
    let harness = TestHarness::with_config(config);

    let mut torrent = fixtures::finished_torrent("t1");
    torrent.files_selected = Some(Utc::now());
    harness.torrents.insert_torrent(torrent).await;
    for id in ["d1", "d2"] {
        harness
            .downloads
            .insert(fixtures::linked_download(
                id,
                "t1",
                &format!("https://dl.example.com/files/{id}/video.mkv"),
            ))
            .await;
    }

    harness.tick().await;

    // A zero limit still admits one worker.
    assert_eq!(harness.registry.download_count().await, 1);
}

#[tokio::test]
async fn test_progress_is_pushed_once_per_effective_tick() {
    let harness = TestHarness::new();

    harness.tick().await;
    harness.tick().await;
    assert_eq!(harness.progress.update_count(), 2);

    // Push failures never surface.
    harness.progress.set_failing(true);
    harness.tick().await;
    assert_eq!(harness.progress.update_count(), 3);
}
