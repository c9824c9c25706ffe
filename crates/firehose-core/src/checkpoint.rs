//! Periodic checkpoint emission.
//!
//! The emitter samples the [`ChangeCursor`] on a fixed interval and
//! pushes the value to a single-slot update channel. Whoever persists
//! checkpoints reads the channel at its own pace; only the newest value
//! is kept.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cursor::ChangeCursor;

/// Default interval between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(5);

/// Emits the cursor on a schedule and once more on shutdown.
pub struct CheckpointEmitter {
    cursor: ChangeCursor,
    updates: Arc<watch::Sender<u64>>,
    interval: Duration,
}

impl CheckpointEmitter {
    pub fn new(cursor: ChangeCursor, updates: Arc<watch::Sender<u64>>, interval: Duration) -> Self {
        Self {
            cursor,
            updates,
            interval,
        }
    }

    /// Push the current cursor to the update channel.
    ///
    /// Never blocks and succeeds even when nobody is listening.
    pub fn emit(&self) -> u64 {
        let value = self.cursor.get();
        self.updates.send_replace(value);
        value
    }

    /// Emit every interval until `shutdown` fires, then emit a final value.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let value = self.emit();
                    info!(cursor = value, "Emitted final checkpoint");
                    return;
                }
                _ = ticker.tick() => {
                    let value = self.emit();
                    debug!(cursor = value, "Emitted checkpoint");
                }
            }
        }
    }
}
