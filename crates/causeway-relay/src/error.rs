//! Relay error types.

use thiserror::Error;

/// Errors from connection and routing operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No target matches the requested URL or id.
    #[error("no target matches: {0}")]
    TargetNotFound(String),

    /// The upstream connection could not be established.
    #[error("upstream connection to {url} failed: {reason}")]
    UpstreamConnect {
        /// The endpoint that was dialed.
        url: String,
        /// Why the dial failed.
        reason: String,
    },

    /// The adapter has no live upstream connection.
    #[error("adapter {0} is not started")]
    NotStarted(String),

    /// The client session's outbound channel is gone.
    #[error("client session closed")]
    SessionClosed,
}
