//! Torrent runner implementation.
//!
//! Drives torrents through their lifecycle on every tick:
//! - Sweep: promote finished download/unpack workers to the next stage
//! - Reconcile: per-torrent state machine against the debrid status
//! - Start: spawn new download/unpack workers under the concurrency caps

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::download::{Download, DownloadError, DownloadStore};
use crate::progress::ProgressReporter;
use crate::torrent::{HostDownloadAction, RdStatus, Torrent, TorrentsFacade};
use crate::worker::{BulkStatusClient, DownloadClientKind, WorkerError, WorkerFactory};

use super::registry::ActiveRegistry;
use super::types::{RunnerError, RunnerStatus};

/// Mandatory delay between successive download starts within one
/// torrent; the debrid API rate-limits link issuance.
const INTER_START_DELAY: Duration = Duration::from_millis(100);

/// Ticks slower than this get logged.
const SLOW_TICK: Duration = Duration::from_millis(1000);

/// The torrent runner - a single-pass reconciliation engine over the
/// persistent torrent rows and the in-memory worker registries.
pub struct TorrentRunner {
    config: Arc<RwLock<Config>>,
    torrents: Arc<dyn TorrentsFacade>,
    downloads: Arc<dyn DownloadStore>,
    workers: Arc<dyn WorkerFactory>,
    bulk_status: Option<Arc<dyn BulkStatusClient>>,
    progress: Arc<dyn ProgressReporter>,
    registry: Arc<ActiveRegistry>,
}

impl TorrentRunner {
    /// Create a new runner.
    pub fn new(
        config: Arc<RwLock<Config>>,
        torrents: Arc<dyn TorrentsFacade>,
        downloads: Arc<dyn DownloadStore>,
        workers: Arc<dyn WorkerFactory>,
        bulk_status: Option<Arc<dyn BulkStatusClient>>,
        progress: Arc<dyn ProgressReporter>,
        registry: Arc<ActiveRegistry>,
    ) -> Self {
        Self {
            config,
            torrents,
            downloads,
            workers,
            bulk_status,
            progress,
            registry,
        }
    }

    /// Current registry occupancy.
    pub async fn status(&self) -> RunnerStatus {
        RunnerStatus {
            active_downloads: self.registry.download_count().await,
            active_unpacks: self.registry.unpack_count().await,
        }
    }

    /// One-shot recovery sweep, run once at process start.
    ///
    /// A crash loses the in-memory workers but leaves their `started`
    /// stamps behind, which would strand those stages forever. Rewinding
    /// `started` to null re-queues the stage on the next tick. Running
    /// the sweep twice is a no-op the second time.
    pub async fn initialize(&self) -> Result<(), RunnerError> {
        let torrents = self.torrents.get().await?;

        let mut rewound = 0usize;
        for torrent in &torrents {
            if torrent.is_completed() {
                continue;
            }
            for download in &torrent.downloads {
                if download.error.is_some() {
                    continue;
                }
                if download.download_queued.is_some()
                    && download.download_started.is_some()
                    && download.download_finished.is_none()
                {
                    self.downloads
                        .update_download_started(&download.id, None)
                        .await?;
                    rewound += 1;
                }
                if download.unpacking_queued.is_some()
                    && download.unpacking_started.is_some()
                    && download.unpacking_finished.is_none()
                {
                    self.downloads
                        .update_unpacking_started(&download.id, None)
                        .await?;
                    rewound += 1;
                }
            }
        }

        if rewound > 0 {
            info!("rewound {rewound} in-flight stages left by a previous run");
        }
        Ok(())
    }

    /// One reconciliation pass. Never fails: configuration problems turn
    /// the tick into a no-op and every per-torrent error is contained.
    /// The external driver guarantees ticks do not overlap.
    pub async fn tick(&self) {
        let tick_started = Instant::now();
        let config = self.config.read().await.clone();

        if config.provider.api_key.is_empty() {
            debug!("provider API key not set, skipping tick");
            return;
        }
        if config.download_client.client.is_symlink() {
            let mounted = config
                .download_client
                .rclone_mount_path
                .as_deref()
                .is_some_and(|p| Path::new(p).exists());
            if !mounted {
                warn!("rclone mount path is not reachable, skipping tick");
                return;
            }
        }
        if config.download_client.download_path.is_empty() {
            error!("download path is not configured");
            return;
        }
        let download_limit = config.general.download_limit.max(1) as usize;
        let unpack_limit = config.general.unpack_limit.max(1) as usize;

        let torrents = match self.torrents.get().await {
            Ok(torrents) => torrents,
            Err(e) => {
                error!("failed to load torrents: {e}");
                return;
            }
        };

        self.poll_bulk_status().await;
        self.sweep_finished_downloads(&torrents).await;
        self.sweep_finished_unpacks().await;

        // Torrent-level passes; a torrent consumed here skips the
        // per-torrent reconciliation below.
        let mut skip = HashSet::new();
        self.process_retries(&torrents, &mut skip).await;
        self.prune_errored(&torrents, &mut skip).await;
        self.expire_lifetimes(&torrents, &mut skip).await;

        for torrent in &torrents {
            if torrent.is_completed() || skip.contains(&torrent.id) {
                continue;
            }
            if let Err(e) = self
                .reconcile_torrent(torrent, &config, download_limit, unpack_limit)
                .await
            {
                warn!(torrent_id = %torrent.id, "reconciliation failed: {e}");
                self.mark_torrent_failed(&torrent.id, &e.to_string()).await;
            }
        }

        if let Err(e) = self.progress.update().await {
            warn!("remote progress push failed: {e}");
        }

        let elapsed = tick_started.elapsed();
        if elapsed > SLOW_TICK {
            warn!("tick took {}ms", elapsed.as_millis());
        }
    }

    /// Refresh every aria2-backed download worker from one bulk query.
    async fn poll_bulk_status(&self) {
        let Some(client) = &self.bulk_status else {
            return;
        };

        let aria2_workers: Vec<_> = self
            .registry
            .download_snapshot()
            .await
            .into_iter()
            .filter(|(_, worker)| worker.kind() == DownloadClientKind::Aria2c)
            .collect();
        if aria2_workers.is_empty() {
            return;
        }

        match client.tell_all().await {
            Ok(statuses) => {
                for (_, worker) in &aria2_workers {
                    worker.update_status(&statuses);
                }
            }
            Err(e) => warn!("bulk status poll failed: {e}"),
        }
    }

    /// Promote every finished download worker: clean finishes queue for
    /// unpacking, failures retry until the per-download budget runs out.
    async fn sweep_finished_downloads(&self, torrents: &[Torrent]) {
        for (download_id, worker) in self.registry.download_snapshot().await {
            if !worker.finished() {
                continue;
            }

            let row = match self.downloads.get(&download_id).await {
                Ok(Some(row)) => row,
                Ok(None) => {
                    warn!(%download_id, "finished worker has no download row, dropping it");
                    self.registry.remove_download(&download_id).await;
                    continue;
                }
                Err(e) => {
                    // Row unavailable; leave the entry so the next tick
                    // can sweep it.
                    warn!(%download_id, "failed to load download row: {e}");
                    continue;
                }
            };

            let outcome = match worker.error() {
                Some(message) => {
                    let retry_cap = torrents
                        .iter()
                        .find(|t| t.id == row.torrent_id)
                        .map(|t| t.download_retry_attempts)
                        .unwrap_or(0);
                    self.fail_or_retry_download(&row, retry_cap, &message).await
                }
                None => self.finish_download(&download_id).await,
            };

            match outcome {
                Ok(()) => {
                    self.registry.remove_download(&download_id).await;
                }
                Err(DownloadError::NotFound(_)) => {
                    self.registry.remove_download(&download_id).await;
                }
                Err(e) => warn!(%download_id, "failed to sweep download: {e}"),
            }
        }
    }

    /// Reset the download for another attempt, or record the terminal
    /// failure once the budget is spent.
    async fn fail_or_retry_download(
        &self,
        row: &Download,
        retry_cap: u32,
        message: &str,
    ) -> Result<(), DownloadError> {
        if row.retry_count < retry_cap {
            info!(
                download_id = %row.id,
                attempt = row.retry_count + 1,
                "download failed, resetting for retry: {message}"
            );
            self.downloads.reset(&row.id).await?;
            self.downloads
                .update_retry_count(&row.id, row.retry_count + 1)
                .await?;
        } else {
            warn!(download_id = %row.id, "download failed terminally: {message}");
            self.downloads
                .update_error(&row.id, Some(message.to_string()))
                .await?;
            self.downloads
                .update_completed(&row.id, Some(Utc::now()))
                .await?;
        }
        Ok(())
    }

    /// A cleanly finished transfer moves straight into the unpack queue;
    /// both stamps carry the same instant.
    async fn finish_download(&self, download_id: &str) -> Result<(), DownloadError> {
        let now = Utc::now();
        self.downloads
            .update_download_finished(download_id, Some(now))
            .await?;
        self.downloads
            .update_unpacking_queued(download_id, Some(now))
            .await?;
        Ok(())
    }

    /// Promote every finished unpack worker. Unpacking has no retry
    /// budget: an error is terminal immediately.
    async fn sweep_finished_unpacks(&self) {
        for (download_id, worker) in self.registry.unpack_snapshot().await {
            if !worker.finished() {
                continue;
            }

            let now = Utc::now();
            let outcome = match worker.error() {
                Some(message) => {
                    warn!(%download_id, "unpack failed: {message}");
                    match self.downloads.update_error(&download_id, Some(message)).await {
                        Ok(()) => self.downloads.update_completed(&download_id, Some(now)).await,
                        Err(e) => Err(e),
                    }
                }
                None => {
                    match self
                        .downloads
                        .update_unpacking_finished(&download_id, Some(now))
                        .await
                    {
                        Ok(()) => self.downloads.update_completed(&download_id, Some(now)).await,
                        Err(e) => Err(e),
                    }
                }
            };

            match outcome {
                Ok(()) | Err(DownloadError::NotFound(_)) => {
                    self.registry.remove_unpack(&download_id).await;
                }
                Err(e) => warn!(%download_id, "failed to sweep unpack: {e}"),
            }
        }
    }

    /// Honor pending retry requests, or drop them once the torrent's
    /// budget is exhausted. The facade owns the counter increment.
    async fn process_retries(&self, torrents: &[Torrent], skip: &mut HashSet<String>) {
        for torrent in torrents {
            if torrent.retry.is_none() {
                continue;
            }

            if torrent.retry_count > torrent.torrent_retry_attempts {
                // Budget exhausted: drop the marker, keep the count as
                // the cap-reached signal.
                if let Err(e) = self
                    .torrents
                    .update_retry(&torrent.id, None, torrent.retry_count)
                    .await
                {
                    warn!(torrent_id = %torrent.id, "failed to clear retry marker: {e}");
                    skip.insert(torrent.id.clone());
                }
                continue;
            }

            info!(torrent_id = %torrent.id, attempt = torrent.retry_count, "retrying torrent");
            if let Err(e) = self
                .torrents
                .retry_torrent(&torrent.id, torrent.retry_count)
                .await
            {
                warn!(torrent_id = %torrent.id, "retry failed: {e}");
                self.mark_torrent_failed(&torrent.id, &e.to_string()).await;
            }
            // Re-submission rewinds the torrent; reconciling the stale
            // row this tick would fight the facade.
            skip.insert(torrent.id.clone());
        }
    }

    /// Delete error-terminal torrents whose error TTL has elapsed.
    async fn prune_errored(&self, torrents: &[Torrent], skip: &mut HashSet<String>) {
        for torrent in torrents {
            if torrent.error.is_none() || torrent.delete_on_error <= 0 {
                continue;
            }
            let Some(completed) = torrent.completed else {
                continue;
            };
            if Utc::now() < completed + chrono::Duration::minutes(torrent.delete_on_error) {
                continue;
            }

            info!(
                torrent_id = %torrent.id,
                "deleting errored torrent after {} minutes",
                torrent.delete_on_error
            );
            match self.torrents.delete(&torrent.id, true, true, true).await {
                Ok(()) => {
                    skip.insert(torrent.id.clone());
                }
                Err(e) => warn!(torrent_id = %torrent.id, "failed to delete torrent: {e}"),
            }
        }
    }

    /// Expire torrents that never produced downloads within their
    /// lifetime. The retry budget is burned so a queued retry cannot
    /// resurrect the torrent.
    async fn expire_lifetimes(&self, torrents: &[Torrent], skip: &mut HashSet<String>) {
        for torrent in torrents {
            if !torrent.downloads.is_empty() || torrent.is_completed() || torrent.lifetime <= 0 {
                continue;
            }
            if Utc::now() < torrent.added + chrono::Duration::minutes(torrent.lifetime) {
                continue;
            }

            let message = format!("Torrent lifetime of {} minutes reached", torrent.lifetime);
            info!(torrent_id = %torrent.id, "{message}");

            if let Err(e) = self
                .torrents
                .update_retry(&torrent.id, None, torrent.torrent_retry_attempts)
                .await
            {
                warn!(torrent_id = %torrent.id, "failed to burn retry budget: {e}");
            }
            if let Err(e) = self
                .torrents
                .update_complete(&torrent.id, Some(message), Utc::now(), true)
                .await
            {
                warn!(torrent_id = %torrent.id, "failed to expire torrent: {e}");
            }
            skip.insert(torrent.id.clone());
        }
    }

    /// The per-torrent state machine. Any error short-circuits the
    /// remaining steps; the caller records it as the torrent's terminal
    /// error and the tick continues with the next torrent.
    async fn reconcile_torrent(
        &self,
        torrent: &Torrent,
        config: &Config,
        download_limit: usize,
        unpack_limit: usize,
    ) -> Result<(), RunnerError> {
        // The cloud gave up; carry its raw status over as the error.
        if torrent.rd_status == RdStatus::Error {
            self.torrents
                .update_complete(
                    &torrent.id,
                    Some(torrent.rd_status_raw.clone()),
                    Utc::now(),
                    true,
                )
                .await?;
            return Ok(());
        }

        // File selection, once the cloud asks for it or has finished.
        if matches!(
            torrent.rd_status,
            RdStatus::WaitingForFileSelection | RdStatus::Finished
        ) && torrent.files_selected.is_none()
            && torrent.downloads.is_empty()
        {
            debug!(torrent_id = %torrent.id, "selecting files");
            self.torrents.select_files(&torrent.id).await?;
            self.torrents
                .update_files_selected(&torrent.id, Utc::now())
                .await?;
        }

        // Materialize the child downloads. Guarded on the row loaded at
        // tick entry, so this fires the tick after file selection.
        if torrent.rd_status == RdStatus::Finished
            && torrent.downloads.is_empty()
            && torrent.files_selected.is_some()
            && torrent.host_download_action == HostDownloadAction::DownloadAll
        {
            debug!(torrent_id = %torrent.id, "creating downloads");
            self.torrents.create_downloads(&torrent.id).await?;
        }

        self.start_downloads(torrent, config, download_limit).await?;
        self.start_unpacks(torrent, config, unpack_limit).await?;

        self.finish_torrent_if_complete(torrent).await?;

        Ok(())
    }

    /// Start queued downloads for one torrent, oldest first, while the
    /// global cap allows. Starts are dispatched concurrently and joined
    /// before the results are written back in two batch updates.
    async fn start_downloads(
        &self,
        torrent: &Torrent,
        config: &Config,
        download_limit: usize,
    ) -> Result<(), RunnerError> {
        let mut eligible: Vec<&Download> = torrent
            .downloads
            .iter()
            .filter(|d| d.awaits_download())
            .collect();
        if eligible.is_empty() {
            return Ok(());
        }
        eligible.sort_by_key(|d| d.download_queued);

        let target_dir = download_target_dir(config, torrent);
        let mut handles: Vec<(String, JoinHandle<Result<Option<String>, WorkerError>>)> =
            Vec::new();

        for download in eligible {
            if self.registry.download_count().await >= download_limit {
                break;
            }
            if self.registry.contains_download(&download.id).await {
                // State desync: the row says never-started but a worker
                // is live. Leave this torrent alone until it clears.
                warn!(download_id = %download.id, "download already has an active worker");
                break;
            }

            // Space out successive link requests; the first of the
            // batch goes out immediately.
            if !handles.is_empty() {
                tokio::time::sleep(INTER_START_DELAY).await;
            }

            let mut download = download.clone();
            if download.link.is_none() {
                match self.torrents.unrestrict_link(&download.id).await {
                    // The facade persisted the link; keep the in-memory
                    // copy so the worker sees it without a re-read.
                    Ok(link) => download.link = Some(link),
                    Err(e) => {
                        warn!(download_id = %download.id, "unrestrict failed: {e}");
                        self.downloads
                            .update_error(&download.id, Some(e.to_string()))
                            .await?;
                        self.downloads
                            .update_completed(&download.id, Some(Utc::now()))
                            .await?;
                        break;
                    }
                }
            }

            self.downloads
                .update_download_started(&download.id, Some(Utc::now()))
                .await?;

            let worker = self
                .workers
                .download_worker(&download, torrent, &target_dir);
            self.registry
                .insert_download(download.id.clone(), Arc::clone(&worker))
                .await;

            debug!(download_id = %download.id, kind = worker.kind().as_str(), "starting download");
            let handle = tokio::spawn(async move { worker.start().await });
            handles.push((download.id.clone(), handle));
        }

        if handles.is_empty() {
            return Ok(());
        }

        let mut remote_ids = HashMap::new();
        let mut start_errors = HashMap::new();
        for (download_id, handle) in handles {
            match handle.await {
                Ok(Ok(Some(remote_id))) => {
                    remote_ids.insert(download_id, remote_id);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    self.registry.remove_download(&download_id).await;
                    start_errors.insert(download_id, e.to_string());
                }
                Err(e) => {
                    self.registry.remove_download(&download_id).await;
                    start_errors.insert(download_id, format!("worker task failed: {e}"));
                }
            }
        }

        if !remote_ids.is_empty() {
            self.downloads.update_remote_id_batch(remote_ids).await?;
        }
        if !start_errors.is_empty() {
            self.downloads.update_error_batch(start_errors).await?;
        }
        Ok(())
    }

    /// Start queued unpacks for one torrent. Non-archives skip the stage
    /// outright; a full registry defers only the archives it cannot fit,
    /// not the rest of the queue.
    async fn start_unpacks(
        &self,
        torrent: &Torrent,
        config: &Config,
        unpack_limit: usize,
    ) -> Result<(), RunnerError> {
        let mut eligible: Vec<&Download> = torrent
            .downloads
            .iter()
            .filter(|d| d.awaits_unpack())
            .collect();
        if eligible.is_empty() {
            return Ok(());
        }
        eligible.sort_by_key(|d| d.download_queued);

        let target_dir = download_target_dir(config, torrent);

        for download in eligible {
            let Some(link) = download.link.as_deref() else {
                self.downloads
                    .update_error(&download.id, Some("Download Link cannot be null".to_string()))
                    .await?;
                self.downloads
                    .update_completed(&download.id, Some(Utc::now()))
                    .await?;
                continue;
            };

            if !is_archive(link) {
                // Nothing to extract; close out the whole unpack stage
                // with a single instant.
                let now = Utc::now();
                self.downloads
                    .update_unpacking_started(&download.id, Some(now))
                    .await?;
                self.downloads
                    .update_unpacking_finished(&download.id, Some(now))
                    .await?;
                self.downloads
                    .update_completed(&download.id, Some(now))
                    .await?;
                continue;
            }

            if config.download_client.client.is_symlink() {
                self.downloads
                    .update_error(
                        &download.id,
                        Some("Will not unzip with SymlinkDownloader!".to_string()),
                    )
                    .await?;
                self.downloads
                    .update_completed(&download.id, Some(Utc::now()))
                    .await?;
                continue;
            }

            if self.registry.unpack_count().await >= unpack_limit {
                continue;
            }
            if self.registry.contains_unpack(&download.id).await {
                continue;
            }

            self.downloads
                .update_unpacking_started(&download.id, Some(Utc::now()))
                .await?;

            let worker = self.workers.unpack_worker(download, torrent, &target_dir);
            self.registry
                .insert_unpack(download.id.clone(), Arc::clone(&worker))
                .await;

            debug!(download_id = %download.id, "starting unpack");
            let download_id = download.id.clone();
            tokio::spawn(async move {
                if let Err(e) = worker.start().await {
                    warn!(%download_id, "unpack worker start failed: {e}");
                }
            });
        }
        Ok(())
    }

    /// Complete the torrent once every child is terminal, then apply the
    /// configured finish action and fire the post-completion hook.
    async fn finish_torrent_if_complete(&self, torrent: &Torrent) -> Result<(), RunnerError> {
        let cloud_only = torrent.rd_status == RdStatus::Finished
            && torrent.host_download_action == HostDownloadAction::DownloadNone;
        if torrent.downloads.is_empty() && !cloud_only {
            return Ok(());
        }

        let complete_count = torrent
            .downloads
            .iter()
            .filter(|d| d.is_completed())
            .count();
        let total_bytes: u64 = torrent.downloads.iter().map(|d| d.bytes_total).sum();
        let done_bytes: u64 = torrent.downloads.iter().map(|d| d.bytes_done).sum();
        if total_bytes > 0 {
            debug!(
                torrent_id = %torrent.id,
                progress = done_bytes * 100 / total_bytes,
                "torrent progress"
            );
        }

        if complete_count != torrent.downloads.len() {
            return Ok(());
        }

        info!(torrent_id = %torrent.id, "torrent complete");
        self.torrents
            .update_complete(&torrent.id, None, Utc::now(), true)
            .await?;

        if let Some((remove_remote, remove_client, remove_files)) =
            torrent.finished_action.delete_flags()
        {
            self.torrents
                .delete(&torrent.id, remove_remote, remove_client, remove_files)
                .await?;
        }

        if let Err(e) = self.torrents.run_torrent_complete(&torrent.id).await {
            error!(torrent_id = %torrent.id, "post-completion hook failed: {e}");
        }
        Ok(())
    }

    /// Record a reconciliation error as the torrent's terminal state.
    /// Not marked terminal at the facade, so a retry request can still
    /// resurrect the torrent.
    async fn mark_torrent_failed(&self, torrent_id: &str, message: &str) {
        if let Err(e) = self
            .torrents
            .update_complete(torrent_id, Some(message.to_string()), Utc::now(), false)
            .await
        {
            error!(torrent_id, "failed to record torrent error: {e}");
        }
    }
}

/// Directory a torrent's files land in: the configured root plus the
/// lower-cased category when one is set.
fn download_target_dir(config: &Config, torrent: &Torrent) -> PathBuf {
    let mut dir = PathBuf::from(&config.download_client.download_path);
    if let Some(category) = torrent.category_suffix() {
        dir.push(category);
    }
    dir
}

/// Decoded filename from a link's last path segment.
fn filename_from_link(link: &str) -> Option<String> {
    url::Url::parse(link)
        .ok()?
        .path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| s.to_string())
        })
}

/// Only rar and zip archives go through the unpack stage.
fn is_archive(link: &str) -> bool {
    filename_from_link(link)
        .map(|name| {
            let name = name.to_lowercase();
            name.ends_with(".rar") || name.ends_with(".zip")
        })
        .unwrap_or(false)
}
