//! Publishing of job records to the sink.

use std::sync::Arc;

use tracing::{debug, error};

use firehose_types::JobRecord;

use crate::error::FirehoseError;
use crate::sink::Sink;

/// Serializes job records as JSON and writes them to a [`Sink`].
#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn Sink>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    /// Encode a record exactly as it will appear on the sink.
    pub fn encode(record: &JobRecord) -> Result<Vec<u8>, FirehoseError> {
        Ok(serde_json::to_vec(record)?)
    }

    /// Publish one record.
    ///
    /// Records that fail to serialize are logged and dropped. Returns
    /// `true` when the bytes were handed to the sink.
    pub async fn publish(&self, record: &JobRecord) -> bool {
        match Self::encode(record) {
            Ok(bytes) => {
                debug!(
                    job_id = %record.id,
                    modify_index = record.modify_index,
                    bytes = bytes.len(),
                    sink = %self.sink.name(),
                    "Publishing job"
                );
                self.sink.put(bytes).await;
                true
            }
            Err(e) => {
                error!(job_id = %record.id, error = %e, "Failed to serialize job, dropping");
                false
            }
        }
    }
}
