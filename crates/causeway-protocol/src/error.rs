//! Protocol error types.

use thiserror::Error;

/// Errors from frame parsing and serialization.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The payload was JSON but not a recognizable frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A frame could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
