//! causeway-relay — connection and target-lifecycle management.
//!
//! One [`Adapter`](adapter::Adapter) per device keeps the single upstream
//! connection and fans traffic out to any number of client sessions. The
//! [`AdapterCollection`](collection::AdapterCollection) discovers targets,
//! creates and evicts adapters, and binds the dialect-specific rewrite rules
//! to each target on first connection.

pub mod adapter;
pub mod collection;
pub mod error;
pub mod session;

pub use adapter::{Adapter, AdapterEvent};
pub use collection::{AdapterCollection, ClientHandle};
pub use error::RelayError;
pub use session::{ClientSession, SessionId};
