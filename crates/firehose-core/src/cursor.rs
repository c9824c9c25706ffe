//! Shared change cursor.
//!
//! Only the change watcher advances the cursor. The checkpoint emitter
//! reads it concurrently, so the value lives in an atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Highest modification index whose job has been dispatched.
///
/// Cloning shares the underlying value.
#[derive(Debug, Clone, Default)]
pub struct ChangeCursor {
    value: Arc<AtomicU64>,
}

impl ChangeCursor {
    /// Create a cursor starting at `initial`.
    pub fn new(initial: u64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(initial)),
        }
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Move the cursor forward to `index`. Never moves it back.
    ///
    /// Returns the value after the update.
    pub fn advance(&self, index: u64) -> u64 {
        let previous = self.value.fetch_max(index, Ordering::AcqRel);
        previous.max(index)
    }

    /// Overwrite the value. Only used before the watcher starts.
    pub(crate) fn restore(&self, index: u64) {
        self.value.store(index, Ordering::Release);
    }
}
