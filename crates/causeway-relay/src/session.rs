//! Client sessions.
//!
//! A session is one protocol-compliant client attached to a target. The
//! relay only needs a way to push serialized frames at it; the actual
//! client socket lives in the binary's accept loop.

use causeway_protocol::Frame;
use tokio::sync::mpsc;

use crate::error::RelayError;

/// Unique identifier for a client session within one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a session ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One attached client.
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    outbound: mpsc::UnboundedSender<String>,
}

impl ClientSession {
    /// Wrap an outbound frame channel as a session.
    pub fn new(id: SessionId, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { id, outbound }
    }

    /// The session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Push a frame to the client.
    pub fn send(&self, frame: &Frame) -> Result<(), RelayError> {
        let text = frame.to_json().map_err(|e| {
            tracing::warn!(session = %self.id, %e, "dropping unserializable frame");
            RelayError::SessionClosed
        })?;
        self.outbound
            .send(text)
            .map_err(|_| RelayError::SessionClosed)
    }
}
