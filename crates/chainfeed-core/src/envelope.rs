//! `{type, payload}` wire envelope, used in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;

/// The unit exchanged over the transport as a JSON text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Discriminator, e.g. `"new_block"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Arbitrary structured payload; absent and `null` both decode to `None`.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(kind: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Parse a text frame. Anything that is not an object with a string
    /// `type` field is a [`FeedError::Decode`].
    pub fn decode(text: &str) -> Result<Self, FeedError> {
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(FeedError::Serialization)
    }

    /// The payload, or `Value::Null` when absent.
    pub fn into_payload(self) -> Value {
        self.payload.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_uses_type_key() {
        let env = Envelope::new("subscribe", Some(json!({"topic": "blocks"})));
        let text = env.encode().unwrap();
        assert!(text.contains("\"type\":\"subscribe\""));
        assert!(text.contains("\"payload\":{\"topic\":\"blocks\"}"));
    }

    #[test]
    fn absent_payload_encodes_as_null() {
        let text = Envelope::new("ping", None).encode().unwrap();
        assert_eq!(text, r#"{"type":"ping","payload":null}"#);
    }

    #[test]
    fn decode_without_payload() {
        let env = Envelope::decode(r#"{"type":"peer_update"}"#).unwrap();
        assert_eq!(env.kind, "peer_update");
        assert!(env.payload.is_none());
        assert_eq!(env.into_payload(), Value::Null);
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        for bad in [
            "not json",
            "[1,2,3]",
            r#"{"payload":{}}"#,
            r#"{"type":7,"payload":{}}"#,
            "",
        ] {
            let err = Envelope::decode(bad).unwrap_err();
            assert!(matches!(err, FeedError::Decode(_)), "accepted {bad:?}");
        }
    }
}
