//! The reconciliation core.
//!
//! [`TorrentRunner::tick`] is the single entry point: one pass that
//! reconciles the persistent torrent rows, the in-memory worker
//! registries and the remote debrid state, then starts whatever new
//! work the concurrency caps allow. The external driver calls it on a
//! fixed cadence and guarantees ticks never overlap.

mod registry;
mod runner;
mod types;

pub use registry::ActiveRegistry;
pub use runner::TorrentRunner;
pub use types::{RunnerError, RunnerStatus};
