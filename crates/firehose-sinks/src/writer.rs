//! Line-oriented sink over any async writer.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, error};

use firehose_core::Sink;

/// Writes each event followed by a newline.
///
/// Writes are serialized so concurrent fetch tasks never interleave
/// two events on one line.
pub struct WriterSink<W> {
    name: &'static str,
    writer: Mutex<W>,
}

/// Sink printing events to standard output.
pub type StdoutSink = WriterSink<Stdout>;

impl StdoutSink {
    pub fn stdout() -> Self {
        WriterSink::new("stdout", tokio::io::stdout())
    }
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: &'static str, writer: W) -> Self {
        Self {
            name,
            writer: Mutex::new(writer),
        }
    }

    /// Take back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self) {
        debug!(sink = self.name, "Sink ready");
    }

    async fn stop(&self) {
        if let Err(e) = self.writer.lock().await.flush().await {
            error!(sink = self.name, error = %e, "Failed to flush sink");
        }
    }

    async fn put(&self, data: Vec<u8>) {
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(&data).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            error!(sink = self.name, error = %e, "Failed to write event");
        }
    }
}
