//! Wire envelope shared by inbound and outbound frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named event with a JSON payload.
///
/// ```json
/// { "event": "scan:progress", "data": { "percent": 42 }, "timestamp": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Event name.
    pub event: String,
    /// Event payload; `null` when the sender omitted it.
    #[serde(default)]
    pub data: Value,
    /// Sender timestamp, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireMessage {
    /// Builds an outbound frame stamped with the current time.
    #[must_use]
    pub fn outbound(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Some(Utc::now()),
        }
    }

    /// Builds a frame without a timestamp.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: None,
        }
    }

    /// Encodes the frame as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the payload cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a frame from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] for malformed JSON or a missing
    /// `event` field.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_data_defaults_to_null() {
        let Ok(msg) = WireMessage::from_json(r#"{"event":"system:alert"}"#) else {
            panic!("expected frame to parse");
        };
        assert_eq!(msg.event, "system:alert");
        assert_eq!(msg.data, Value::Null);
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn missing_event_is_rejected() {
        assert!(WireMessage::from_json(r#"{"data":{}}"#).is_err());
        assert!(WireMessage::from_json("not json").is_err());
    }

    #[test]
    fn outbound_is_stamped() {
        let msg = WireMessage::outbound("subscribe", json!({"type": "scan", "id": "abc"}));
        assert!(msg.timestamp.is_some());
        let Ok(text) = msg.to_json() else {
            panic!("expected frame to encode");
        };
        assert!(text.contains("\"event\":\"subscribe\""));
        assert!(text.contains("\"timestamp\""));
    }

    #[test]
    fn unstamped_omits_timestamp() {
        let Ok(text) = WireMessage::new("scan:started", json!({"scan_id": "s1"})).to_json() else {
            panic!("expected frame to encode");
        };
        assert!(!text.contains("timestamp"));
    }
}
