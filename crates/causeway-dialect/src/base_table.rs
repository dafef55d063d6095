//! The base hook list — the default (v9) dialect behavior.
//!
//! Every dialect table starts from these hooks; newer dialects layer
//! targeted overrides on top.

use causeway_protocol::Frame;
use serde_json::Value;

use crate::error::DialectError;
use crate::hooks::{HookFn, HookList};

/// Hooks shared by all dialects.
pub fn base_hooks() -> HookList {
    vec![
        ("Runtime.getProperties", get_properties as HookFn),
        ("Runtime.evaluate", evaluate),
    ]
}

/// Extract the property list from a `Runtime.getProperties` result.
///
/// Engines disagree on the shape: the list may arrive as the bare result
/// array, under a legacy `properties` key, or already canonical under
/// `result`.
pub(crate) fn property_list(result: &Value) -> Result<Vec<Value>, DialectError> {
    if let Some(list) = result.as_array() {
        return Ok(list.clone());
    }
    if let Some(list) = result.get("properties").and_then(Value::as_array) {
        return Ok(list.clone());
    }
    if let Some(list) = result.get("result").and_then(Value::as_array) {
        return Ok(list.clone());
    }
    Err(DialectError::MalformedPayload {
        method: "Runtime.getProperties",
        detail: "no property list in result".into(),
    })
}

/// Re-wrap the property list in the canonical `{ "result": [...] }` shape.
pub(crate) fn wrap_property_list(mut frame: Frame, list: Vec<Value>) -> Frame {
    frame.result = Some(serde_json::json!({ "result": list }));
    frame
}

/// Normalize `Runtime.getProperties` to the canonical shape, entries
/// untouched.
fn get_properties(frame: Frame) -> Result<Frame, DialectError> {
    let result = frame.result.clone().ok_or(DialectError::MalformedPayload {
        method: "Runtime.getProperties",
        detail: "response has no result".into(),
    })?;
    let list = property_list(&result)?;
    Ok(wrap_property_list(frame, list))
}

/// Strip the legacy `wasThrown` flag from `Runtime.evaluate` results.
fn evaluate(mut frame: Frame) -> Result<Frame, DialectError> {
    if let Some(Value::Object(obj)) = frame.result.as_mut() {
        obj.remove("wasThrown");
    }
    Ok(frame)
}
