//! HTTP sink.
//!
//! `put` only enqueues; the worker started by `start` POSTs events one at
//! a time with exponential backoff between attempts. When the queue is
//! full new events are dropped and logged.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, Url};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use firehose_core::Sink;
use firehose_types::HttpSinkSettings;

use crate::error::SinkError;

/// Configuration for [`HttpSink`].
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Endpoint receiving one POST per event
    pub url: Url,
    /// Queue capacity
    pub buffer_size: usize,
    /// Attempts per event
    pub max_retries: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// First retry delay
    pub initial_backoff: Duration,
}

impl HttpSinkConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            buffer_size: 1024,
            max_retries: 3,
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

impl TryFrom<&HttpSinkSettings> for HttpSinkConfig {
    type Error = SinkError;

    fn try_from(settings: &HttpSinkSettings) -> Result<Self, Self::Error> {
        let raw = settings.url.as_deref().ok_or(SinkError::MissingUrl)?;
        let url = Url::parse(raw).map_err(|e| SinkError::Config(format!("'{raw}': {e}")))?;

        Ok(Self {
            buffer_size: settings.buffer_size,
            max_retries: settings.max_retries,
            timeout: Duration::from_secs(settings.timeout_secs),
            ..Self::new(url)
        })
    }
}

/// Posts each event as `application/json`.
pub struct HttpSink {
    client: Client,
    config: HttpSinkConfig,
    sender: mpsc::Sender<Vec<u8>>,
    receiver: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    shutdown: CancellationToken,
    finished: CancellationToken,
    started: AtomicBool,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;
        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));

        Ok(Self {
            client,
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
            shutdown: CancellationToken::new(),
            finished: CancellationToken::new(),
            started: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Events accepted by the endpoint.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Events lost to a full queue or exhausted retries.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn deliver(&self, event: Vec<u8>) {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.post(&event).await {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) if attempts < self.config.max_retries => match backoff.next_backoff() {
                    Some(delay) => {
                        warn!(
                            error = %e,
                            attempt = attempts,
                            retry_in_ms = delay.as_millis(),
                            "Event delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(error = %e, "Backoff exhausted, dropping event");
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                },
                Err(e) => {
                    error!(error = %e, attempts, "Max retries exceeded, dropping event");
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    async fn post(&self, event: &[u8]) -> Result<(), String> {
        let response = self
            .client
            .post(self.config.url.clone())
            .header("Content-Type", "application/json")
            .body(event.to_vec())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl Sink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self) {
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            warn!("HTTP sink already started");
            return;
        };
        self.started.store(true, Ordering::SeqCst);
        info!(url = %self.config.url, "HTTP sink started");

        loop {
            tokio::select! {
                biased;
                event = receiver.recv() => match event {
                    Some(event) => self.deliver(event).await,
                    None => break,
                },
                _ = self.shutdown.cancelled() => {
                    receiver.close();
                    let mut drained = 0;
                    while let Some(event) = receiver.recv().await {
                        self.deliver(event).await;
                        drained += 1;
                    }
                    debug!(drained, "Drained HTTP sink queue");
                    break;
                }
            }
        }

        info!(
            delivered = self.delivered(),
            dropped = self.dropped(),
            "HTTP sink stopped"
        );
        self.finished.cancel();
    }

    async fn stop(&self) {
        self.shutdown.cancel();
        if self.started.load(Ordering::SeqCst) {
            self.finished.cancelled().await;
        }
    }

    async fn put(&self, data: Vec<u8>) {
        if let Err(e) = self.sender.try_send(data) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => warn!("HTTP sink queue full, dropping event"),
                mpsc::error::TrySendError::Closed(_) => warn!("HTTP sink stopped, dropping event"),
            }
        }
    }
}
