//! Change watcher.
//!
//! Long-polls the job list, diffs the returned summaries against the
//! [`ChangeCursor`] and dispatches a fetch-and-publish task for every job
//! modified after it.
//!
//! # Cursor discipline
//!
//! Two indexes are tracked separately:
//! - the query wait index, set to the server index of the previous
//!   response so the next list call blocks until something changes;
//! - the change cursor, set to the highest modification index that has
//!   had a fetch dispatched (or completed, in [`DispatchMode::Barrier`]).
//!
//! A summary whose modification index equals the cursor is already seen.
//! This is what makes resuming from a persisted cursor emit nothing old.
//!
//! # Dispatch
//!
//! Fetches run on a [`JoinSet`] bounded by a semaphore. In
//! [`DispatchMode::Detached`] the cursor advances as soon as the batch is
//! dispatched, so a crash before the fetches finish loses those events on
//! resume. [`DispatchMode::Barrier`] waits for the batch and leaves both
//! indexes untouched if any job failed, so the batch is scanned again.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use firehose_types::{DispatchMode, QueryOptions, WatcherSettings};

use crate::control_plane::ControlPlane;
use crate::cursor::ChangeCursor;
use crate::error::ControlPlaneError;
use crate::publisher::Publisher;

/// Watcher tuning.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Server-side wait for the blocking list query
    pub wait_time: Duration,
    /// Let followers answer the list query
    pub allow_stale: bool,
    /// Constant sleep after a failed list query or a failed barrier batch
    pub retry_interval: Duration,
    /// Maximum fetches in flight at once
    pub max_concurrent_fetches: usize,
    /// When the cursor is allowed to move past a dispatched job
    pub dispatch_mode: DispatchMode,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from(&WatcherSettings::default())
    }
}

impl From<&WatcherSettings> for WatcherConfig {
    fn from(settings: &WatcherSettings) -> Self {
        Self {
            wait_time: settings.wait_time(),
            allow_stale: settings.allow_stale,
            retry_interval: settings.retry_interval(),
            max_concurrent_fetches: settings.max_concurrent_fetches.max(1),
            dispatch_mode: settings.dispatch_mode,
        }
    }
}

impl WatcherConfig {
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }
}

/// Outcome of one poll iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Server index moved since the previous response
    pub changed: bool,
    /// Fetch tasks dispatched
    pub dispatched: usize,
    /// Summaries at or below the cursor
    pub skipped: usize,
    /// Fetches that failed (only known in barrier mode)
    pub failed: usize,
    /// Cursor and wait index were advanced
    pub committed: bool,
    /// Cursor after the iteration
    pub cursor: u64,
    /// Wait index for the next query
    pub wait_index: u64,
}

/// Long-poll loop over the job list.
pub struct ChangeWatcher {
    control_plane: Arc<dyn ControlPlane>,
    publisher: Publisher,
    cursor: ChangeCursor,
    config: WatcherConfig,
    query: QueryOptions,
    candidate_max: u64,
    permits: Arc<Semaphore>,
    in_flight: JoinSet<bool>,
    batch_failures: usize,
}

impl ChangeWatcher {
    /// Create a watcher resuming from the cursor's current value.
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        publisher: Publisher,
        cursor: ChangeCursor,
        config: WatcherConfig,
    ) -> Self {
        let start = cursor.get();
        let query = QueryOptions::default()
            .with_wait_index(start)
            .with_wait_time(config.wait_time)
            .with_allow_stale(config.allow_stale);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));

        Self {
            control_plane,
            publisher,
            cursor,
            config,
            query,
            candidate_max: start,
            permits,
            in_flight: JoinSet::new(),
            batch_failures: 0,
        }
    }

    /// Query state for the next iteration.
    pub fn query(&self) -> &QueryOptions {
        &self.query
    }

    pub fn cursor(&self) -> &ChangeCursor {
        &self.cursor
    }

    /// Number of fetch tasks that have not been reaped yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Poll until `shutdown` fires.
    ///
    /// Cancelling `shutdown` abandons the current long-poll and the retry
    /// sleep. Fetches already dispatched are awaited, never aborted, so
    /// their events reach the sink before this returns.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut retry = Constant::new(self.config.retry_interval);
        info!(
            cursor = self.cursor.get(),
            wait_index = self.query.wait_index,
            mode = ?self.config.dispatch_mode,
            "Watching for job changes"
        );

        while !shutdown.is_cancelled() {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.poll_once() => result,
            };

            let delay = match result {
                Ok(report) if report.committed || !report.changed => None,
                Ok(report) => {
                    warn!(
                        failed = report.failed,
                        dispatched = report.dispatched,
                        "Batch incomplete, cursor held back"
                    );
                    Some(self.config.retry_interval)
                }
                Err(e) => {
                    error!(error = %e, "Unable to fetch jobs");
                    Some(retry.next_backoff().unwrap_or(self.config.retry_interval))
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let outstanding = self.in_flight.len();
        if outstanding > 0 {
            info!(outstanding, "Waiting for in-flight job fetches");
            self.drain().await;
        }
        info!(cursor = self.cursor.get(), "Change watcher stopped");
    }

    /// Run one list query and dispatch fetches for new changes.
    ///
    /// List failures leave every index untouched and are returned to the
    /// caller.
    pub async fn poll_once(&mut self) -> Result<CycleReport, ControlPlaneError> {
        self.reap_finished();

        let (jobs, meta) = self.control_plane.list_jobs(&self.query).await?;

        let remote_index = meta.last_index;
        let local_index = self.query.wait_index;
        let cursor = self.cursor.get();

        if remote_index == local_index {
            debug!(remote_index, local_index, "Jobs index is unchanged");
            return Ok(CycleReport {
                cursor,
                wait_index: local_index,
                ..Default::default()
            });
        }

        debug!(remote_index, local_index, jobs = jobs.len(), "Jobs index changed");

        let mut report = CycleReport {
            changed: true,
            ..Default::default()
        };
        let mut batch_max = self.candidate_max;
        self.batch_failures = 0;

        for job in jobs {
            if job.modify_index <= cursor {
                report.skipped += 1;
                continue;
            }

            batch_max = batch_max.max(job.modify_index);
            self.dispatch(job.id).await;
            report.dispatched += 1;
        }

        if self.config.dispatch_mode == DispatchMode::Barrier {
            self.drain().await;
            report.failed = self.batch_failures;
            if report.failed > 0 {
                report.cursor = cursor;
                report.wait_index = local_index;
                return Ok(report);
            }
        }

        self.query.wait_index = remote_index;
        self.candidate_max = batch_max;
        report.cursor = self.cursor.advance(batch_max);
        report.wait_index = remote_index;
        report.committed = true;

        if report.dispatched > 0 {
            info!(
                dispatched = report.dispatched,
                skipped = report.skipped,
                cursor = report.cursor,
                "Dispatched job changes"
            );
        }

        Ok(report)
    }

    /// Spawn a fetch-and-publish task, waiting for a free permit first.
    async fn dispatch(&mut self, job_id: String) {
        let permit = loop {
            match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => break permit,
                Err(_) => match self.in_flight.join_next().await {
                    Some(result) => {
                        if !log_join(result) {
                            self.batch_failures += 1;
                        }
                    }
                    None => {
                        // No tasks hold permits, so the semaphore is closed.
                        error!(job_id = %job_id, "Fetch permits unavailable, skipping job");
                        return;
                    }
                },
            }
        };

        let control_plane = Arc::clone(&self.control_plane);
        let publisher = self.publisher.clone();
        self.in_flight.spawn(async move {
            let _permit = permit;
            fetch_and_publish(control_plane.as_ref(), &publisher, &job_id).await
        });
    }

    /// Collect results of tasks that already finished.
    fn reap_finished(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            log_join(result);
        }
    }

    /// Wait for every in-flight task. Returns how many failed.
    ///
    /// Failures also count towards the current batch.
    async fn drain(&mut self) -> usize {
        let mut failed = 0;
        while let Some(result) = self.in_flight.join_next().await {
            if !log_join(result) {
                failed += 1;
            }
        }
        self.batch_failures += failed;
        failed
    }
}

/// Fetch one job and publish it. Failures are logged, never retried.
async fn fetch_and_publish(
    control_plane: &dyn ControlPlane,
    publisher: &Publisher,
    job_id: &str,
) -> bool {
    match control_plane.job_info(job_id).await {
        Ok(record) => publisher.publish(&record).await,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Could not read job");
            false
        }
    }
}

fn log_join(result: Result<bool, tokio::task::JoinError>) -> bool {
    match result {
        Ok(published) => published,
        Err(e) => {
            error!(error = %e, "Job fetch task panicked");
            false
        }
    }
}
