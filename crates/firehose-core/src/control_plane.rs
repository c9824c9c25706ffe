//! Control plane collaborator.
//!
//! The firehose only needs two calls: a blocking list of job summaries
//! and a fetch of one job's full definition.

use async_trait::async_trait;

use firehose_types::{JobRecord, JobSummary, QueryMeta, QueryOptions};

use crate::error::ControlPlaneError;

/// Read access to the job-scheduling control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List job summaries.
    ///
    /// Blocks server-side until the index moves past `query.wait_index`
    /// or `query.wait_time` elapses. The returned [`QueryMeta`] carries the
    /// server's index as of this response.
    async fn list_jobs(
        &self,
        query: &QueryOptions,
    ) -> Result<(Vec<JobSummary>, QueryMeta), ControlPlaneError>;

    /// Fetch the full definition of one job.
    async fn job_info(&self, job_id: &str) -> Result<JobRecord, ControlPlaneError>;
}
