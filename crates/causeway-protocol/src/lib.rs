//! causeway-protocol — wire frame envelope for the remote-debugging bridge.
//!
//! Both directions of the relay speak the same envelope: an optional
//! integer message id, an optional method name, and optional
//! params / result / error payloads. This crate owns the envelope type,
//! parsing, serialization, and frame classification.

pub mod error;
pub mod frame;

pub use error::ProtocolError;
pub use frame::{Frame, FrameKind};
