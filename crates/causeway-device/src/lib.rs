//! causeway-device — debuggable targets and device collaborators.
//!
//! A target is one debuggable context (page/app) exposed by a device or
//! simulator. This crate owns the target record and its lifecycle events,
//! the collaborator seams for discovery and simulator runtime enumeration,
//! and the lazily-populated simulator OS-version cache.

pub mod discovery;
pub mod error;
pub mod simulator;
pub mod target;

pub use discovery::{Discovery, HttpDiscovery, RawTargetRecord};
pub use error::DeviceError;
pub use simulator::{
    RuntimeEnumerator, SimctlEnumerator, SimulatorVersionCache, FALLBACK_OS_VERSION,
};
pub use target::{ConnectionState, DeviceKind, Target, TargetEvent, TargetId};
