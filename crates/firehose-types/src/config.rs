//! Configuration loading for the job firehose.
//!
//! Layered config: defaults -> config file -> CLI config file -> env vars.
//! CLI flags are applied by the daemon after loading.
//! The default config file lives at `<config dir>/job-firehose/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How the watcher treats fetch tasks relative to the cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Cursor advances once fetches are dispatched; completion is not awaited
    #[default]
    Detached,
    /// Cursor advances only after every fetch of the batch has published
    Barrier,
}

/// Sink selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// One JSON document per line on stdout
    #[default]
    Stdout,
    /// POST each event to an HTTP endpoint
    Http,
    /// Keep events in memory (dry runs)
    Memory,
}

impl std::fmt::Display for SinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkType::Stdout => write!(f, "stdout"),
            SinkType::Http => write!(f, "http"),
            SinkType::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for SinkType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(SinkType::Stdout),
            "http" => Ok(SinkType::Http),
            "memory" => Ok(SinkType::Memory),
            other => Err(ConfigError::Invalid(format!("unknown sink type '{other}'"))),
        }
    }
}

/// Control plane connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NomadSettings {
    /// HTTP address of a Nomad agent. Falls back to `NOMAD_ADDR`.
    #[serde(default = "default_nomad_address")]
    pub address: String,

    /// ACL token. Falls back to `NOMAD_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,

    /// Namespace to watch. Falls back to `NOMAD_NAMESPACE`.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Region to query. Falls back to `NOMAD_REGION`.
    #[serde(default)]
    pub region: Option<String>,

    /// Timeout for non-blocking requests (job fetches)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_nomad_address() -> String {
    std::env::var("NOMAD_ADDR").unwrap_or_else(|_| "http://127.0.0.1:4646".to_string())
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for NomadSettings {
    fn default() -> Self {
        Self {
            address: default_nomad_address(),
            token: std::env::var("NOMAD_TOKEN").ok(),
            namespace: std::env::var("NOMAD_NAMESPACE").ok(),
            region: std::env::var("NOMAD_REGION").ok(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Change watcher tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherSettings {
    /// Long-poll wait time for the job list
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: u64,

    /// Let followers answer list queries
    #[serde(default = "default_allow_stale")]
    pub allow_stale: bool,

    /// Fixed sleep after a failed list query
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// How often the cursor is pushed to the update channel
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval_secs: u64,

    /// Upper bound on in-flight job fetches
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Whether the cursor waits for fetches to complete
    #[serde(default)]
    pub dispatch_mode: DispatchMode,
}

fn default_wait_time() -> u64 {
    300
}

fn default_allow_stale() -> bool {
    true
}

fn default_retry_interval() -> u64 {
    10
}

fn default_checkpoint_interval() -> u64 {
    5
}

fn default_max_concurrent_fetches() -> usize {
    32
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            wait_time_secs: default_wait_time(),
            allow_stale: default_allow_stale(),
            retry_interval_secs: default_retry_interval(),
            checkpoint_interval_secs: default_checkpoint_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            dispatch_mode: DispatchMode::default(),
        }
    }
}

impl WatcherSettings {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs)
    }
}

/// HTTP sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSinkSettings {
    /// Endpoint receiving one POST per event
    #[serde(default)]
    pub url: Option<String>,

    /// Events buffered before `put` starts dropping
    #[serde(default = "default_http_buffer_size")]
    pub buffer_size: usize,

    /// Attempts per event before it is dropped
    #[serde(default = "default_http_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_http_buffer_size() -> usize {
    1024
}

fn default_http_max_retries() -> u32 {
    3
}

fn default_http_timeout() -> u64 {
    10
}

impl Default for HttpSinkSettings {
    fn default() -> Self {
        Self {
            url: None,
            buffer_size: default_http_buffer_size(),
            max_retries: default_http_max_retries(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SinkSettings {
    /// Which sink to build
    #[serde(rename = "type", default)]
    pub sink_type: SinkType,

    /// Settings for the HTTP sink
    #[serde(default)]
    pub http: HttpSinkSettings,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding persisted checkpoints
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// Control plane connection
    #[serde(default)]
    pub nomad: NomadSettings,

    /// Watcher tuning
    #[serde(default)]
    pub watcher: WatcherSettings,

    /// Output sink
    #[serde(default)]
    pub sink: SinkSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_checkpoint_dir() -> String {
    ProjectDirs::from("", "", "job-firehose")
        .map(|p| p.data_local_dir().join("checkpoints"))
        .unwrap_or_else(|| PathBuf::from("./checkpoints"))
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            checkpoint_dir: default_checkpoint_dir(),
            nomad: NomadSettings::default(),
            watcher: WatcherSettings::default(),
            sink: SinkSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults (Nomad fields honour `NOMAD_*` variables)
    /// 2. Config file (`<config dir>/job-firehose/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`FIREHOSE_*`, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "job-firehose")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");
        let nomad = NomadSettings::default();

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("checkpoint_dir", default_checkpoint_dir())?
            .set_default("nomad.address", nomad.address)?
            .set_default("nomad.token", nomad.token)?
            .set_default("nomad.namespace", nomad.namespace)?
            .set_default("nomad.region", nomad.region)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // FIREHOSE_LOG_LEVEL, FIREHOSE_SINK__TYPE, FIREHOSE_WATCHER__WAIT_TIME_SECS, ...
        builder = builder.add_source(
            Environment::with_prefix("FIREHOSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the firehose cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watcher.wait_time_secs == 0 {
            return Err(ConfigError::Invalid("watcher.wait_time_secs must be > 0".to_string()));
        }
        if self.watcher.retry_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "watcher.retry_interval_secs must be > 0".to_string(),
            ));
        }
        if self.watcher.checkpoint_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "watcher.checkpoint_interval_secs must be > 0".to_string(),
            ));
        }
        if self.watcher.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "watcher.max_concurrent_fetches must be > 0".to_string(),
            ));
        }
        if self.sink.sink_type == SinkType::Http && self.sink.http.url.is_none() {
            return Err(ConfigError::Invalid(
                "sink.http.url is required for the http sink".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand `~/` in the checkpoint directory.
    pub fn expanded_checkpoint_dir(&self) -> PathBuf {
        if let Some(rest) = self.checkpoint_dir.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.checkpoint_dir)
    }
}
