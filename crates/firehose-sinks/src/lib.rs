//! Sinks for the job firehose.
//!
//! Every sink implements [`firehose_core::Sink`]:
//! - [`StdoutSink`]: one JSON document per line on stdout
//! - [`HttpSink`]: buffered POST of each event with retries
//! - [`MemorySink`]: keeps events in memory for tests and dry runs
//!
//! [`build_sink`] picks one from [`SinkSettings`].

mod error;
mod http;
mod memory;
mod writer;

use std::sync::Arc;

use firehose_core::Sink;
use firehose_types::{SinkSettings, SinkType};

pub use error::SinkError;
pub use http::{HttpSink, HttpSinkConfig};
pub use memory::MemorySink;
pub use writer::{StdoutSink, WriterSink};

/// Build the sink selected in settings.
///
/// # Errors
///
/// Returns `SinkError::MissingUrl` for an http sink without a url, or
/// `SinkError::Config` if the HTTP client cannot be built.
pub fn build_sink(settings: &SinkSettings) -> Result<Arc<dyn Sink>, SinkError> {
    let sink: Arc<dyn Sink> = match settings.sink_type {
        SinkType::Stdout => Arc::new(StdoutSink::stdout()),
        SinkType::Memory => Arc::new(MemorySink::new()),
        SinkType::Http => {
            let config = HttpSinkConfig::try_from(&settings.http)?;
            Arc::new(HttpSink::new(config)?)
        }
    };
    Ok(sink)
}
