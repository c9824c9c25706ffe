//! Sink construction errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP sink selected without an endpoint
    #[error("http sink requires a url")]
    MissingUrl,

    /// Sink could not be built from its settings
    #[error("Invalid sink configuration: {0}")]
    Config(String),
}
