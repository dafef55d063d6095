//! Overrides for the 12.2 physical-device dialect.

use causeway_protocol::Frame;
use serde_json::Value;

use crate::error::DialectError;
use crate::hooks::{HookFn, HookList};

/// Hooks this dialect overrides relative to the base table.
pub fn v12_overrides() -> HookList {
    vec![("Debugger.setBreakpointByUrl", set_breakpoint_by_url as HookFn)]
}

/// Engines of this generation report a single `actualLocation` instead of
/// the canonical `locations` array.
fn set_breakpoint_by_url(mut frame: Frame) -> Result<Frame, DialectError> {
    let Some(Value::Object(obj)) = frame.result.as_mut() else {
        return Ok(frame);
    };
    if obj.contains_key("locations") {
        return Ok(frame);
    }
    if let Some(location) = obj.remove("actualLocation") {
        obj.insert("locations".into(), Value::Array(vec![location]));
    }
    Ok(frame)
}
