//! Resource subscription protocol.
//!
//! Subscriptions are advisory: the server decides what to deliver. The
//! client keeps no ledger, so subscribing twice sends two frames and
//! unsubscribing from something never subscribed is not an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::messages::WireMessage;

/// Outbound event name for subscribing.
pub const SUBSCRIBE_EVENT: &str = "subscribe";
/// Outbound event name for unsubscribing.
pub const UNSUBSCRIBE_EVENT: &str = "unsubscribe";

/// Kind of resource a subscription targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A scan run.
    Scan,
    /// An AI agent.
    Agent,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scan => "scan",
            Self::Agent => "agent",
        })
    }
}

/// Payload of a `subscribe` / `unsubscribe` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Resource kind.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Resource identifier.
    pub id: String,
}

impl SubscriptionRequest {
    /// Creates a request for `(kind, id)`.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Builds the `subscribe` frame.
    #[must_use]
    pub fn subscribe_message(&self) -> WireMessage {
        WireMessage::outbound(SUBSCRIBE_EVENT, self.to_value())
    }

    /// Builds the `unsubscribe` frame.
    #[must_use]
    pub fn unsubscribe_message(&self) -> WireMessage {
        WireMessage::outbound(UNSUBSCRIBE_EVENT, self.to_value())
    }

    /// Returns the JSON payload `{type, id}`.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.kind, "id": self.id })
    }
}
