//! Mock progress reporter for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

use crate::progress::{ProgressError, ProgressReporter};

/// Mock implementation of the [`ProgressReporter`] trait.
#[derive(Default)]
pub struct MockProgressReporter {
    updates: AtomicU32,
    fail: AtomicBool,
}

impl MockProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every push fail until cleared.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// How many times `update` was invoked.
    pub fn update_count(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressReporter for MockProgressReporter {
    async fn update(&self) -> Result<(), ProgressError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProgressError::Push("subscriber unreachable".to_string()));
        }
        Ok(())
    }
}
