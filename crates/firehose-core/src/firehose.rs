//! Lifecycle controller for the jobs firehose.
//!
//! Owns the stop signal and the update channel, and runs the sink, the
//! change watcher and the checkpoint emitter as independent tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use firehose_types::WatcherSettings;

use crate::checkpoint::{CheckpointEmitter, DEFAULT_CHECKPOINT_INTERVAL};
use crate::control_plane::ControlPlane;
use crate::cursor::ChangeCursor;
use crate::error::FirehoseError;
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::watcher::{ChangeWatcher, WatcherConfig};

/// Name used to namespace persisted checkpoints.
pub const FIREHOSE_NAME: &str = "jobs";

/// Firehose configuration.
#[derive(Debug, Clone)]
pub struct FirehoseConfig {
    pub watcher: WatcherConfig,
    pub checkpoint_interval: Duration,
}

impl Default for FirehoseConfig {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

impl From<&WatcherSettings> for FirehoseConfig {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            watcher: WatcherConfig::from(settings),
            checkpoint_interval: settings.checkpoint_interval(),
        }
    }
}

/// Decode a persisted cursor.
///
/// Only non-negative integers are accepted; anything else (floats,
/// strings, negative numbers) is an [`FirehoseError::InvalidRestoreType`].
pub fn decode_restore_value(value: &serde_json::Value) -> Result<u64, FirehoseError> {
    value.as_u64().ok_or_else(|| {
        let kind = match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "bool",
            serde_json::Value::Number(n) if n.is_f64() => "float",
            serde_json::Value::Number(_) => "negative integer",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        FirehoseError::InvalidRestoreType(format!(
            "unknown restore type '{kind}' with value '{value}'"
        ))
    })
}

/// Change feed over the control plane's jobs.
///
/// ```ignore
/// let firehose = Arc::new(JobsFirehose::new(client, sink, FirehoseConfig::default()));
/// let runner = firehose.clone();
/// tokio::spawn(async move { runner.start().await });
/// // ...
/// firehose.stop().await;
/// ```
pub struct JobsFirehose {
    control_plane: Arc<dyn ControlPlane>,
    sink: Arc<dyn Sink>,
    config: FirehoseConfig,
    cursor: ChangeCursor,
    updates: Arc<watch::Sender<u64>>,
    shutdown_token: CancellationToken,
    stopped: CancellationToken,
    started: AtomicBool,
}

impl JobsFirehose {
    /// Create a firehose with its cursor at zero.
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        sink: Arc<dyn Sink>,
        config: FirehoseConfig,
    ) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            control_plane,
            sink,
            config,
            cursor: ChangeCursor::default(),
            updates: Arc::new(updates),
            shutdown_token: CancellationToken::new(),
            stopped: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Stable name of this change feed.
    pub fn name(&self) -> &'static str {
        FIREHOSE_NAME
    }

    /// Receiver for checkpoint values.
    ///
    /// Holds only the newest cursor; it closes once the firehose and its
    /// checkpoint emitter are gone.
    pub fn update_channel(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Resume from a previously persisted cursor.
    ///
    /// # Errors
    ///
    /// Returns `FirehoseError::AlreadyRunning` once `start` has been called.
    pub fn set_restore_value(&self, value: u64) -> Result<(), FirehoseError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(FirehoseError::AlreadyRunning);
        }
        self.cursor.restore(value);
        info!(firehose = FIREHOSE_NAME, cursor = value, "Restored change cursor");
        Ok(())
    }

    /// Shared handle on the change cursor.
    pub fn cursor(&self) -> &ChangeCursor {
        &self.cursor
    }

    /// Token cancelled by [`JobsFirehose::stop`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Check if the firehose has started and not been stopped.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown_token.is_cancelled()
    }

    /// Run the firehose until [`JobsFirehose::stop`] is called.
    ///
    /// Starts the sink, the change watcher and the checkpoint emitter,
    /// then blocks on the stop signal. Shutdown runs in order: the watcher
    /// abandons its long-poll and waits for dispatched fetches, the
    /// emitter publishes the final checkpoint, then the sink is stopped
    /// and drained. Returns once all of that has finished.
    ///
    /// # Errors
    ///
    /// Returns `FirehoseError::AlreadyRunning` if called more than once.
    pub async fn start(&self) -> Result<(), FirehoseError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(FirehoseError::AlreadyRunning);
        }

        info!(
            firehose = FIREHOSE_NAME,
            cursor = self.cursor.get(),
            sink = %self.sink.name(),
            "Starting firehose"
        );

        let sink = Arc::clone(&self.sink);
        let sink_task = tokio::spawn(async move { sink.start().await });

        let watcher = ChangeWatcher::new(
            Arc::clone(&self.control_plane),
            Publisher::new(Arc::clone(&self.sink)),
            self.cursor.clone(),
            self.config.watcher.clone(),
        );
        let watcher_task = tokio::spawn(watcher.run(self.shutdown_token.clone()));

        let emitter = CheckpointEmitter::new(
            self.cursor.clone(),
            Arc::clone(&self.updates),
            self.config.checkpoint_interval,
        );
        let emitter_stop = CancellationToken::new();
        let emitter_task = tokio::spawn(emitter.run(emitter_stop.clone()));

        self.shutdown_token.cancelled().await;

        if let Err(e) = watcher_task.await {
            error!(error = %e, "Change watcher failed");
        }

        // Every dispatched fetch has published by now
        emitter_stop.cancel();
        if let Err(e) = emitter_task.await {
            error!(error = %e, "Checkpoint emitter failed");
        }

        self.sink.stop().await;
        if let Err(e) = sink_task.await {
            error!(error = %e, sink = %self.sink.name(), "Sink task failed");
        }
        self.stopped.cancel();

        info!(firehose = FIREHOSE_NAME, cursor = self.cursor.get(), "Firehose stopped");
        Ok(())
    }

    /// Signal every activity to stop and wait until the sink has drained.
    ///
    /// Calling this more than once is harmless.
    pub async fn stop(&self) {
        let first = !self.shutdown_token.is_cancelled();
        if first {
            info!(firehose = FIREHOSE_NAME, "Stopping firehose");
            self.shutdown_token.cancel();
        } else {
            debug!(firehose = FIREHOSE_NAME, "Stop already requested");
        }

        if self.started.load(Ordering::SeqCst) {
            self.stopped.cancelled().await;
        } else if first {
            self.sink.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingSink, ScriptedControlPlane};
    use firehose_types::{JobRecord, JobSummary};
    use serde_json::json;

    fn build_firehose(
        control_plane: &Arc<ScriptedControlPlane>,
        sink: &Arc<RecordingSink>,
    ) -> Arc<JobsFirehose> {
        let config = FirehoseConfig {
            watcher: WatcherConfig::default().with_retry_interval(Duration::from_millis(10)),
            checkpoint_interval: Duration::from_millis(20),
        };
        Arc::new(JobsFirehose::new(control_plane.clone(), sink.clone(), config))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn test_decode_restore_value() {
        assert_eq!(decode_restore_value(&json!(42)).unwrap(), 42);
        assert_eq!(decode_restore_value(&json!(0)).unwrap(), 0);

        for bad in [json!(1.5), json!(-1), json!("42"), json!(null), json!([1])] {
            let result = decode_restore_value(&bad);
            assert!(
                matches!(result, Err(FirehoseError::InvalidRestoreType(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_restore_keeps_cursor() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);

        firehose.set_restore_value(7).unwrap();
        let restored = decode_restore_value(&json!(1.5)).and_then(|v| firehose.set_restore_value(v));
        assert!(restored.is_err());
        assert_eq!(firehose.cursor().get(), 7);

        let restored = decode_restore_value(&json!(42)).and_then(|v| firehose.set_restore_value(v));
        assert!(restored.is_ok());
        assert_eq!(firehose.cursor().get(), 42);
    }

    #[test]
    fn test_name() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        let sink = Arc::new(RecordingSink::new());
        assert_eq!(build_firehose(&control_plane, &sink).name(), "jobs");
    }

    #[tokio::test]
    async fn test_end_to_end_cycle() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        control_plane.insert_record(
            JobRecord::new("b", 9).with_field("Datacenters", json!(["dc1"])),
        );
        control_plane.push_list(vec![JobSummary::new("a", 5), JobSummary::new("b", 9)], 9);
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);
        firehose.set_restore_value(5).unwrap();

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });

        wait_for(|| sink.events().len() == 1 && firehose.cursor().get() == 9).await;
        assert!(firehose.is_running());
        assert!(sink.is_started());

        firehose.stop().await;
        handle.await.unwrap().unwrap();

        assert!(sink.is_stopped());
        assert!(!firehose.is_running());
        assert_eq!(control_plane.fetches(), vec!["b"]);
        let events = sink.events();
        assert_eq!(events[0]["ID"], "b");
        assert_eq!(events[0]["Datacenters"], json!(["dc1"]));
    }

    #[tokio::test]
    async fn test_stop_emits_final_checkpoint() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        control_plane.push_list(vec![JobSummary::new("web", 31)], 31);
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);
        let mut updates = firehose.update_channel();

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });

        wait_for(|| firehose.cursor().get() == 31).await;
        firehose.stop().await;
        handle.await.unwrap().unwrap();

        assert_eq!(*updates.borrow_and_update(), 31);
    }

    #[tokio::test]
    async fn test_start_returns_after_sink_has_stopped() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        let sink = Arc::new(RecordingSink::with_stop_delay(Duration::from_millis(300)));
        let firehose = build_firehose(&control_plane, &sink);

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_for(|| sink.is_started()).await;

        let stopper = firehose.clone();
        tokio::spawn(async move { stopper.stop().await });
        handle.await.unwrap().unwrap();

        assert!(sink.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_fetches() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        control_plane.set_fetch_delay(Duration::from_millis(200));
        control_plane.push_list(vec![JobSummary::new("slow", 3)], 3);
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);
        let updates = firehose.update_channel();

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });

        // Detached mode: the cursor moves before the fetch completes
        wait_for(|| firehose.cursor().get() == 3).await;
        assert!(sink.events().is_empty());

        firehose.stop().await;
        handle.await.unwrap().unwrap();

        assert_eq!(sink.job_ids(), vec!["slow"]);
        assert_eq!(*updates.borrow(), 3);
        assert!(sink.is_stopped());
    }

    #[tokio::test]
    async fn test_restart_resumes_without_duplicates() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        control_plane.push_list(vec![JobSummary::new("a", 4), JobSummary::new("b", 6)], 6);
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);
        let updates = firehose.update_channel();

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_for(|| sink.events().len() == 2).await;
        firehose.stop().await;
        handle.await.unwrap().unwrap();
        let persisted = *updates.borrow();
        assert_eq!(persisted, 6);

        // Second process: same jobs, nothing new until index 8
        control_plane.push_list(vec![JobSummary::new("a", 4), JobSummary::new("b", 6)], 7);
        control_plane.push_list(
            vec![JobSummary::new("a", 4), JobSummary::new("b", 6), JobSummary::new("c", 8)],
            8,
        );
        let resumed_sink = Arc::new(RecordingSink::new());
        let resumed = build_firehose(&control_plane, &resumed_sink);
        resumed.set_restore_value(persisted).unwrap();

        let runner = resumed.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_for(|| resumed.cursor().get() == 8).await;
        resumed.stop().await;
        handle.await.unwrap().unwrap();

        assert_eq!(resumed_sink.job_ids(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let control_plane = Arc::new(ScriptedControlPlane::new());
        let sink = Arc::new(RecordingSink::new());
        let firehose = build_firehose(&control_plane, &sink);

        let runner = firehose.clone();
        let handle = tokio::spawn(async move { runner.start().await });
        wait_for(|| firehose.is_running()).await;

        assert!(matches!(
            firehose.start().await,
            Err(FirehoseError::AlreadyRunning)
        ));
        assert!(matches!(
            firehose.set_restore_value(1),
            Err(FirehoseError::AlreadyRunning)
        ));

        firehose.stop().await;
        firehose.stop().await;
        handle.await.unwrap().unwrap();
    }
}
