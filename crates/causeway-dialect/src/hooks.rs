//! Hook tables and the per-target protocol adapter.
//!
//! A hook table maps method names to rewrite functions over response frames.
//! Tables are built by layering short override lists onto the base list, so
//! each dialect states only what changed relative to its predecessor.

use std::collections::HashMap;

use causeway_protocol::Frame;

use crate::base_table::base_hooks;
use crate::error::DialectError;
use crate::resolver::Dialect;
use crate::v12_table::v12_overrides;
use crate::v13_table::v13_overrides;
use crate::v8_table::v8_overrides;

/// A rewrite hook: consumes the full frame envelope and produces the frame
/// to relay. Errors are contained by [`ProtocolAdapter::apply_result_hook`].
pub type HookFn = fn(Frame) -> Result<Frame, DialectError>;

/// One layer of hooks, as `(method name, hook)` pairs.
pub type HookList = Vec<(&'static str, HookFn)>;

/// A resolved hook table. Later layers override earlier ones per method.
#[derive(Debug, Clone)]
pub struct HookTable {
    hooks: HashMap<&'static str, HookFn>,
}

impl HookTable {
    /// Build a table by merging layers in order; later layers win.
    pub fn from_layers(layers: Vec<HookList>) -> Self {
        let mut hooks = HashMap::new();
        for layer in layers {
            for (method, hook) in layer {
                hooks.insert(method, hook);
            }
        }
        Self { hooks }
    }

    /// Look up the hook for a method, if any.
    pub fn get(&self, method: &str) -> Option<HookFn> {
        self.hooks.get(method).copied()
    }

    /// Number of hooked methods.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the table has no hooks.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// The rewrite layer bound to one target for the target's lifetime.
///
/// Stateless beyond the dialect binding; re-resolved on each new connection.
#[derive(Debug, Clone)]
pub struct ProtocolAdapter {
    dialect: Dialect,
    hooks: HookTable,
}

impl ProtocolAdapter {
    /// Construct the adapter for a dialect.
    ///
    /// Also returns whether that OS generation needs an explicit attach
    /// handshake before debugging frames are valid. The caller applies the
    /// flag to the target; this constructor mutates nothing it does not own.
    pub fn for_dialect(dialect: Dialect) -> (Self, bool) {
        let hooks = match dialect {
            Dialect::V8 => HookTable::from_layers(vec![base_hooks(), v8_overrides()]),
            Dialect::V9 => HookTable::from_layers(vec![base_hooks()]),
            Dialect::V12 => HookTable::from_layers(vec![base_hooks(), v12_overrides()]),
            Dialect::V13 => {
                HookTable::from_layers(vec![base_hooks(), v12_overrides(), v13_overrides()])
            }
        };
        let needs_attach = !matches!(dialect, Dialect::V13);
        (Self { dialect, hooks }, needs_attach)
    }

    /// The dialect this adapter was resolved for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The resolved hook table.
    pub fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    /// Run the result hook for `method` over a response frame.
    ///
    /// Methods without a hook pass through unchanged. A hook failure is
    /// logged and replaced with a neutral empty envelope so one malformed
    /// frame never stalls the relay.
    pub fn apply_result_hook(&self, method: &str, frame: Frame) -> Frame {
        let Some(hook) = self.hooks.get(method) else {
            return frame;
        };
        let id = frame.id;
        match hook(frame) {
            Ok(rewritten) => rewritten,
            Err(err) => {
                tracing::warn!(dialect = %self.dialect, method, %err, "result hook failed, dropping frame");
                Frame::neutral_reply(id)
            }
        }
    }
}
