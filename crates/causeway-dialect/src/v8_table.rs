//! Overrides for the legacy (v8) dialect.

use causeway_protocol::Frame;
use serde_json::Value;

use crate::base_table::wrap_property_list;
use crate::error::DialectError;
use crate::hooks::{HookFn, HookList};

/// Hooks the legacy dialect overrides relative to the base table.
pub fn v8_overrides() -> HookList {
    vec![("Runtime.getProperties", get_properties as HookFn)]
}

/// Legacy engines always nest the property list under `properties` and may
/// emit unnamed accessor entries that newer clients cannot render; unwrap
/// the list and drop entries without a `name`.
fn get_properties(frame: Frame) -> Result<Frame, DialectError> {
    let result = frame.result.clone().ok_or(DialectError::MalformedPayload {
        method: "Runtime.getProperties",
        detail: "response has no result".into(),
    })?;
    let list = result
        .get("properties")
        .and_then(Value::as_array)
        .cloned()
        .ok_or(DialectError::MalformedPayload {
            method: "Runtime.getProperties",
            detail: "legacy result has no properties list".into(),
        })?;
    let named: Vec<Value> = list
        .into_iter()
        .filter(|entry| entry.get("name").is_some())
        .collect();
    Ok(wrap_property_list(frame, named))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v8_overrides_only_get_properties() {
        let hooks = v8_overrides();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].0, "Runtime.getProperties");
    }

    #[test]
    fn v8_get_properties_drops_unnamed_entries() {
        let frame = Frame::response(
            1,
            json!({"properties": [{"name": "a", "value": {}}, {"value": {}}]}),
        );
        let out = get_properties(frame).unwrap();
        let list = out.result.unwrap()["result"].as_array().unwrap().clone();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "a");
    }

    #[test]
    fn v8_get_properties_requires_properties_key() {
        let frame = Frame::response(1, json!({"result": [{"name": "a"}]}));
        assert!(get_properties(frame).is_err());
    }
}
