//! Change-feed core for the job firehose.
//!
//! Watches a job-scheduling control plane for jobs created or modified
//! since the last observed index, fetches their full definitions and
//! hands each one, serialized as JSON, to a pluggable sink.
//!
//! ## Key Components
//!
//! - [`ChangeCursor`]: Highest modification index already dispatched
//! - [`CheckpointEmitter`]: Publishes the cursor for external persistence
//! - [`ChangeWatcher`]: Long-poll loop that diffs job summaries against the cursor
//! - [`Publisher`]: Serializes job records and writes them to the sink
//! - [`JobsFirehose`]: Starts and stops the activities above
//! - [`ControlPlane`] / [`Sink`]: The two collaborators the core consumes
//!
//! ## Delivery
//!
//! Events are delivered at least once. A restart resumes from the last
//! persisted cursor, so the duplicate window is bounded by the checkpoint
//! interval. Events are not ordered by modification index.
//!
//! ## Example
//!
//! ```ignore
//! use firehose_core::{FirehoseConfig, JobsFirehose};
//!
//! let firehose = Arc::new(JobsFirehose::new(client, sink, FirehoseConfig::default()));
//! firehose.set_restore_value(persisted_index)?;
//!
//! let mut updates = firehose.update_channel();
//! tokio::spawn(async move {
//!     while updates.changed().await.is_ok() {
//!         persist(*updates.borrow_and_update());
//!     }
//! });
//!
//! firehose.start().await?;
//! ```

pub mod checkpoint;
pub mod control_plane;
pub mod cursor;
pub mod error;
pub mod firehose;
pub mod publisher;
pub mod sink;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use checkpoint::CheckpointEmitter;
pub use control_plane::ControlPlane;
pub use cursor::ChangeCursor;
pub use error::{ControlPlaneError, FirehoseError};
pub use firehose::{decode_restore_value, FirehoseConfig, JobsFirehose, FIREHOSE_NAME};
pub use publisher::Publisher;
pub use sink::Sink;
pub use watcher::{ChangeWatcher, CycleReport, WatcherConfig};
