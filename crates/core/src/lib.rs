//! Orchestration core for a Real-Debrid backed download manager.
//!
//! The crate's centrepiece is [`TorrentRunner`]: a periodic
//! reconciliation engine that drives user-submitted torrents through
//! the debrid cloud, per-file link generation, local download, optional
//! unpacking and a final retention decision. Everything that touches
//! the outside world (the debrid provider, the persistent store, the
//! workers that move bytes) sits behind traits, with mock
//! implementations in [`testing`].

pub mod config;
pub mod download;
pub mod progress;
pub mod runner;
pub mod testing;
pub mod torrent;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, validate_config, Aria2Config, Config, ConfigError,
    DownloadClientConfig, GeneralConfig, ProviderConfig,
};
pub use download::{Download, DownloadError, DownloadStore};
pub use progress::{ProgressError, ProgressReporter};
pub use runner::{ActiveRegistry, RunnerError, RunnerStatus, TorrentRunner};
pub use torrent::{
    FinishedAction, HostDownloadAction, RdStatus, Torrent, TorrentError, TorrentsFacade,
};
pub use worker::{
    Aria2Client, Aria2Status, BulkStatusClient, DownloadClientKind, DownloadWorker, UnpackWorker,
    WorkerError, WorkerFactory,
};
