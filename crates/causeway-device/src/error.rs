//! Device error types.

use thiserror::Error;

/// Errors from device collaborators.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The discovery call failed (proxy unreachable, bad payload).
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Simulator runtime enumeration failed (spawn or parse).
    #[error("runtime enumeration failed: {0}")]
    Enumeration(String),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        DeviceError::Discovery(err.to_string())
    }
}
