//! Output sink collaborator.

use async_trait::async_trait;

/// Destination for serialized job-change events.
///
/// Buffering, retries and backpressure are the sink's own business;
/// the firehose treats [`Sink::put`] as fire-and-forget.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the sink's own activity. May return immediately or run until
    /// [`Sink::stop`] is called.
    async fn start(&self);

    /// Ask the sink to flush and stop.
    async fn stop(&self);

    /// Hand one serialized event to the sink.
    async fn put(&self, data: Vec<u8>);
}
