//! Worker abstraction.
//!
//! This module provides the seams between the runner and the worker
//! implementations that actually move bytes: download workers (one per
//! in-flight file), unpack workers (one per in-flight archive), and the
//! aria2c bulk-status client the runner uses to refresh every aria2
//! worker in a single request.

mod aria2;
mod types;

pub use aria2::{Aria2Client, Aria2Status};
pub use types::{
    BulkStatusClient, DownloadClientKind, DownloadWorker, UnpackWorker, WorkerError, WorkerFactory,
};
