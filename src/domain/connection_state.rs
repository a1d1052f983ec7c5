//! Connection state machine values and the locally synthesized
//! `connection` payload.

use std::fmt;

use serde::Serialize;

/// Lifecycle of the single transport owned by an event service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session; nothing will happen until `connect()`.
    #[default]
    Idle,
    /// Opening a transport.
    Connecting,
    /// Transport is up.
    Connected,
    /// Transport is up and the server acknowledged authentication.
    Authenticated,
    /// Transport dropped; a reconnection attempt is pending.
    Disconnected,
}

impl ConnectionState {
    /// Returns `true` while outbound frames can be written.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }

    /// Returns `true` while a session is alive (anything but `Idle`).
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Why a live link went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Server sent a close frame.
    ServerDisconnect,
    /// Local `disconnect()` or the service was dropped.
    ClientDisconnect,
    /// Inbound stream ended without a close frame.
    TransportClose,
    /// Read or write failed.
    TransportError,
}

impl DisconnectReason {
    /// Returns the reason string carried in `connection` payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerDisconnect => "io server disconnect",
            Self::ClientDisconnect => "io client disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
        }
    }
}

impl Serialize for DisconnectReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `connection` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionNotice {
    /// Whether the link is now up.
    pub connected: bool,
    /// Present only when `connected` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DisconnectReason>,
}

impl ConnectionNotice {
    /// Notice for a link that just came up.
    #[must_use]
    pub const fn up() -> Self {
        Self {
            connected: true,
            reason: None,
        }
    }

    /// Notice for a link that just dropped.
    #[must_use]
    pub const fn down(reason: DisconnectReason) -> Self {
        Self {
            connected: false,
            reason: Some(reason),
        }
    }

    /// Converts to the JSON value handed to handlers.
    #[must_use]
    pub fn to_value(self) -> serde_json::Value {
        match self.reason {
            Some(reason) => serde_json::json!({
                "connected": self.connected,
                "reason": reason.as_str(),
            }),
            None => serde_json::json!({ "connected": self.connected }),
        }
    }
}
