//! The protocol frame envelope.
//!
//! A frame is a request (id + method), a response (id, no method), or an
//! event (method, no id). Rewrite hooks act only on result/error payloads;
//! every other field passes through the relay untouched, so the envelope
//! keeps payloads as raw `serde_json::Value`s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Classification of a frame by which envelope fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Has an id and a method: a command sent to the debuggee.
    Request,
    /// Has an id but no method: a reply to a prior request.
    Response,
    /// Has a method but no id: an unsolicited broadcast.
    Event,
}

/// One protocol frame, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Message id. Present on requests and responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Method name. Present on requests and events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request parameters or event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Response result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Response error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Frame {
    /// Build a request frame.
    pub fn request(id: i64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: Some(id),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// Build a response frame carrying a result.
    pub fn response(id: i64, result: Value) -> Self {
        Self {
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    /// Build an event frame.
    pub fn event(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    /// The empty-result envelope substituted when a rewrite hook fails.
    ///
    /// Keeps the relay moving: the client sees a well-formed reply with an
    /// empty result instead of a stalled request.
    pub fn neutral_reply(id: Option<i64>) -> Self {
        Self {
            id,
            method: None,
            params: None,
            result: Some(Value::Object(serde_json::Map::new())),
            error: None,
        }
    }

    /// Classify this frame by envelope shape.
    pub fn kind(&self) -> Result<FrameKind, ProtocolError> {
        match (self.id.is_some(), self.method.is_some()) {
            (true, true) => Ok(FrameKind::Request),
            (true, false) => Ok(FrameKind::Response),
            (false, true) => Ok(FrameKind::Event),
            (false, false) => Err(ProtocolError::InvalidFrame(
                "frame has neither id nor method".into(),
            )),
        }
    }

    /// Parse a frame from raw JSON text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::InvalidFrame("frame is not an object".into()));
        }
        let frame: Frame = serde_json::from_value(value)
            .map_err(|e| ProtocolError::InvalidFrame(e.to_string()))?;
        // Reject shapes that classify to nothing up front.
        frame.kind()?;
        Ok(frame)
    }

    /// Serialize the frame to JSON text.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_request_classification() {
        let frame = Frame::request(1, "Runtime.enable", None);
        assert_eq!(frame.kind().unwrap(), FrameKind::Request);
    }

    #[test]
    fn frame_response_classification() {
        let frame = Frame::response(1, serde_json::json!({}));
        assert_eq!(frame.kind().unwrap(), FrameKind::Response);
    }

    #[test]
    fn frame_event_classification() {
        let frame = Frame::event("Debugger.scriptParsed", Some(serde_json::json!({})));
        assert_eq!(frame.kind().unwrap(), FrameKind::Event);
    }

    #[test]
    fn frame_empty_envelope_rejected() {
        let frame = Frame {
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        };
        assert!(matches!(
            frame.kind(),
            Err(ProtocolError::InvalidFrame(_))
        ));
    }

    #[test]
    fn frame_parse_request() {
        let frame =
            Frame::parse(r#"{"id":7,"method":"Runtime.getProperties","params":{"objectId":"1"}}"#)
                .unwrap();
        assert_eq!(frame.id, Some(7));
        assert_eq!(frame.method.as_deref(), Some("Runtime.getProperties"));
        assert_eq!(frame.params.unwrap()["objectId"], "1");
    }

    #[test]
    fn frame_parse_response_with_error() {
        let frame =
            Frame::parse(r#"{"id":3,"error":{"code":-32000,"message":"no such object"}}"#)
                .unwrap();
        assert_eq!(frame.kind().unwrap(), FrameKind::Response);
        assert_eq!(frame.error.unwrap()["code"], -32000);
    }

    #[test]
    fn frame_parse_invalid_json() {
        let result = Frame::parse("not json");
        assert!(matches!(result, Err(ProtocolError::InvalidJson(_))));
    }

    #[test]
    fn frame_parse_non_object() {
        let result = Frame::parse("[1,2,3]");
        assert!(matches!(result, Err(ProtocolError::InvalidFrame(_))));
    }

    #[test]
    fn frame_parse_missing_id_and_method() {
        let result = Frame::parse(r#"{"result":{}}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidFrame(_))));
    }

    #[test]
    fn frame_round_trip_preserves_fields() {
        let frame = Frame::request(42, "Page.navigate", Some(serde_json::json!({"url": "a"})));
        let json = frame.to_json().unwrap();
        let parsed = Frame::parse(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn frame_serialization_omits_absent_fields() {
        let frame = Frame::response(1, serde_json::json!({"ok": true}));
        let json = frame.to_json().unwrap();
        assert!(!json.contains("method"));
        assert!(!json.contains("params"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn frame_neutral_reply_shape() {
        let frame = Frame::neutral_reply(Some(9));
        assert_eq!(frame.id, Some(9));
        assert_eq!(frame.kind().unwrap(), FrameKind::Response);
        assert_eq!(frame.result.unwrap(), serde_json::json!({}));
        assert!(frame.error.is_none());
    }
}
