//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use firehose_types::{JobRecord, JobSummary, QueryMeta, QueryOptions};

use crate::{ControlPlane, ControlPlaneError, Sink};

type ListResponse = Result<(Vec<JobSummary>, QueryMeta), ControlPlaneError>;

/// Control plane that replays scripted list responses.
///
/// Once the script runs out it keeps answering with the last index it
/// returned and no jobs, after a short pause, like an idle long-poll.
#[derive(Default)]
pub struct ScriptedControlPlane {
    responses: Mutex<VecDeque<ListResponse>>,
    records: Mutex<HashMap<String, JobRecord>>,
    failing_jobs: Mutex<Vec<String>>,
    queries: Mutex<Vec<QueryOptions>>,
    fetches: Mutex<Vec<String>>,
    fetch_delay: Mutex<Duration>,
    last_index: Mutex<u64>,
}

impl ScriptedControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_list(&self, jobs: Vec<JobSummary>, last_index: u64) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok((jobs, QueryMeta::new(last_index))));
    }

    pub fn push_list_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ControlPlaneError::Transport(message.to_string())));
    }

    pub fn insert_record(&self, record: JobRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn fail_job(&self, job_id: &str) {
        self.failing_jobs.lock().unwrap().push(job_id.to_string());
    }

    pub fn heal_job(&self, job_id: &str) {
        self.failing_jobs.lock().unwrap().retain(|id| id != job_id);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn queries(&self) -> Vec<QueryOptions> {
        self.queries.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        let mut fetches = self.fetches.lock().unwrap().clone();
        fetches.sort();
        fetches
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn list_jobs(
        &self,
        query: &QueryOptions,
    ) -> Result<(Vec<JobSummary>, QueryMeta), ControlPlaneError> {
        self.queries.lock().unwrap().push(query.clone());

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok((jobs, meta))) => {
                *self.last_index.lock().unwrap() = meta.last_index;
                Ok((jobs, meta))
            }
            Some(Err(e)) => Err(e),
            None => {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let last_index = *self.last_index.lock().unwrap();
                Ok((Vec::new(), QueryMeta::new(last_index.max(query.wait_index))))
            }
        }
    }

    async fn job_info(&self, job_id: &str) -> Result<JobRecord, ControlPlaneError> {
        self.fetches.lock().unwrap().push(job_id.to_string());

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing_jobs.lock().unwrap().iter().any(|id| id == job_id) {
            return Err(ControlPlaneError::Transport(format!("{job_id} unavailable")));
        }

        let record = self.records.lock().unwrap().get(job_id).cloned();
        Ok(record.unwrap_or_else(|| JobRecord::new(job_id, 0)))
    }
}

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Vec<u8>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    stop_delay: Duration,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `stop` takes `delay` to flush.
    pub fn with_stop_delay(delay: Duration) -> Self {
        Self {
            stop_delay: delay,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
            .collect()
    }

    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .events()
            .iter()
            .map(|event| event["ID"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    async fn stop(&self) {
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn put(&self, data: Vec<u8>) {
        self.events.lock().unwrap().push(data);
    }
}
