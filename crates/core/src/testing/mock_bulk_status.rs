//! Mock bulk-status client for testing.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::worker::{Aria2Status, BulkStatusClient, WorkerError};

/// Mock implementation of the [`BulkStatusClient`] trait.
#[derive(Default)]
pub struct MockBulkStatusClient {
    statuses: RwLock<Vec<Aria2Status>>,
    next_error: RwLock<Option<WorkerError>>,
    calls: AtomicU32,
}

impl MockBulkStatusClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot `tell_all` returns.
    pub async fn set_statuses(&self, statuses: Vec<Aria2Status>) {
        *self.statuses.write().await = statuses;
    }

    /// Configure the next `tell_all` to fail with the given error.
    pub async fn set_next_error(&self, error: WorkerError) {
        *self.next_error.write().await = Some(error);
    }

    /// How many times `tell_all` was invoked.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkStatusClient for MockBulkStatusClient {
    async fn tell_all(&self) -> Result<Vec<Aria2Status>, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.statuses.read().await.clone())
    }
}
