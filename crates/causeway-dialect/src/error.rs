//! Dialect error types.

use thiserror::Error;

/// Errors raised inside rewrite hooks.
///
/// These never escape the relay: `ProtocolAdapter::apply_result_hook`
/// catches them, logs, and substitutes a neutral envelope.
#[derive(Debug, Error)]
pub enum DialectError {
    /// The result payload did not have the shape the hook expects.
    #[error("malformed payload for {method}: {detail}")]
    MalformedPayload {
        /// The method whose hook rejected the payload.
        method: &'static str,
        /// What was wrong with it.
        detail: String,
    },
}
