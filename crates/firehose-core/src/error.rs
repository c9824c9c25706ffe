//! Error types for the firehose core.

use thiserror::Error;

/// Errors returned by a [`ControlPlane`](crate::ControlPlane) implementation.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// A blocking query response carried no usable index
    #[error("Response is missing a valid index header")]
    MissingIndex,

    /// The response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The requested job does not exist
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Client could not be built from its configuration
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

/// Errors surfaced by the firehose itself.
#[derive(Debug, Error)]
pub enum FirehoseError {
    /// A persisted cursor was not a non-negative integer
    #[error("Invalid restore type: {0}")]
    InvalidRestoreType(String),

    /// The firehose was already started
    #[error("Firehose is already running")]
    AlreadyRunning,

    /// A job record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Control plane failure
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

impl From<serde_json::Error> for FirehoseError {
    fn from(err: serde_json::Error) -> Self {
        FirehoseError::Serialization(err.to_string())
    }
}
