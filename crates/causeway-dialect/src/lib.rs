//! causeway-dialect — protocol-version resolution and message rewriting.
//!
//! Mobile WebKit engines speak materially different dialects of the
//! remote-debugging protocol depending on OS generation. This crate
//! classifies a target by its reported OS version and device kind, and owns
//! the per-dialect rewrite rules applied to in-flight result payloads.
//!
//! # Architecture
//!
//! Dialects form a refinement chain: each table is built by layering a short
//! override list onto the table before it, so a dialect only states what
//! changed. The table is resolved once at adapter construction time; relaying
//! a frame is a single map lookup.

pub mod base_table;
pub mod error;
pub mod hooks;
pub mod resolver;
pub mod v12_table;
pub mod v13_table;
pub mod v8_table;

pub use error::DialectError;
pub use hooks::{HookFn, HookList, HookTable, ProtocolAdapter};
pub use resolver::{resolve_dialect, Dialect};
