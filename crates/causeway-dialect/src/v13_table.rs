//! Overrides for the newest (13.4+) dialect.

use causeway_protocol::Frame;
use serde_json::Value;

use crate::base_table::{property_list, wrap_property_list};
use crate::error::DialectError;
use crate::hooks::{HookFn, HookList};

/// Hooks the newest dialect overrides relative to its predecessor.
pub fn v13_overrides() -> HookList {
    vec![("Runtime.getProperties", get_properties as HookFn)]
}

/// Filter the property list to own-properties and native-getter properties,
/// forcing `isOwn = true` on every survivor.
///
/// The raw result may carry the list under a `properties` key or as the bare
/// result array; both shapes must be accepted. Downstream property inspection
/// relies on the `isOwn` normalization.
fn get_properties(frame: Frame) -> Result<Frame, DialectError> {
    let result = frame.result.clone().ok_or(DialectError::MalformedPayload {
        method: "Runtime.getProperties",
        detail: "response has no result".into(),
    })?;
    let list = property_list(&result)?;

    let filtered: Vec<Value> = list
        .into_iter()
        .filter(|entry| {
            entry.get("isOwn").and_then(Value::as_bool) == Some(true)
                || entry.get("nativeGetter").is_some()
        })
        .map(|mut entry| {
            if let Value::Object(obj) = &mut entry {
                obj.insert("isOwn".into(), Value::Bool(true));
            }
            entry
        })
        .collect();

    Ok(wrap_property_list(frame, filtered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v13_overrides_only_get_properties() {
        let hooks = v13_overrides();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].0, "Runtime.getProperties");
    }

    #[test]
    fn v13_filters_and_normalizes_is_own() {
        let frame = Frame::response(
            1,
            json!({"properties": [
                {"name": "a", "isOwn": true},
                {"name": "b", "nativeGetter": true},
                {"name": "c", "other": true},
            ]}),
        );
        let out = get_properties(frame).unwrap();
        let result = out.result.unwrap();
        let list = result["result"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["name"], "a");
        assert_eq!(list[0]["isOwn"], true);
        assert_eq!(list[1]["name"], "b");
        assert_eq!(list[1]["isOwn"], true);
    }

    #[test]
    fn v13_accepts_bare_array_result() {
        let frame = Frame::response(
            1,
            json!([
                {"name": "a", "isOwn": true},
                {"name": "b", "other": 1},
            ]),
        );
        let out = get_properties(frame).unwrap();
        let result = out.result.unwrap();
        let list = result["result"].as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "a");
    }

    #[test]
    fn v13_is_own_false_entries_dropped() {
        let frame = Frame::response(1, json!({"properties": [{"name": "a", "isOwn": false}]}));
        let out = get_properties(frame).unwrap();
        assert!(out.result.unwrap()["result"].as_array().unwrap().is_empty());
    }

    #[test]
    fn v13_native_getter_survivor_gains_is_own() {
        let frame = Frame::response(
            1,
            json!({"properties": [{"name": "g", "nativeGetter": {"type": "function"}}]}),
        );
        let out = get_properties(frame).unwrap();
        let result = out.result.unwrap();
        assert_eq!(result["result"][0]["isOwn"], true);
    }

    #[test]
    fn v13_unrecognized_shape_is_error() {
        let frame = Frame::response(1, json!("nonsense"));
        assert!(get_properties(frame).is_err());
    }
}
