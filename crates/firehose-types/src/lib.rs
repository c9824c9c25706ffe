//! # firehose-types
//!
//! Shared types for the job firehose workspace.
//!
//! This crate defines the data structures exchanged between the change
//! watcher, the control-plane client and the daemon:
//! - Jobs: summaries from the list endpoint and full job records
//! - Queries: long-poll options and response metadata
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use firehose_types::{JobSummary, QueryOptions};
//!
//! let query = QueryOptions::default();
//! assert!(query.allow_stale);
//!
//! let summary = JobSummary::new("web", 12);
//! assert_eq!(summary.modify_index, 12);
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod query;

pub use crate::config::{
    DispatchMode, HttpSinkSettings, NomadSettings, Settings, SinkSettings, SinkType,
    WatcherSettings,
};
pub use crate::error::ConfigError;
pub use crate::job::{JobRecord, JobSummary};
pub use crate::query::{QueryMeta, QueryOptions};
