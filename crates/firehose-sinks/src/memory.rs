//! In-memory sink.

use std::sync::Mutex;

use async_trait::async_trait;

use firehose_core::Sink;

/// Keeps every event it receives.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events received so far.
    pub fn events(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return all events.
    pub fn take(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) {}

    async fn stop(&self) {}

    async fn put(&self, data: Vec<u8>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(data);
        }
    }
}
