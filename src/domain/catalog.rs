//! Closed catalog of event names understood by the client.
//!
//! Names are a bit-for-bit contract with the backend. Adding a server event
//! means adding a variant here and a row in [`super::bridge`]; the
//! exhaustive matches below make a missing entry a compile error.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Every event name the client bridges or synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogEvent {
    /// Locally synthesized connection status change.
    Connection,
    /// Server acknowledged authentication.
    Authenticated,
    /// Protocol error reported by the server.
    Error,
    /// Chat message from an agent.
    AgentMessage,
    /// Agent reply to a request.
    AgentResponse,
    /// Agent lifecycle status changed.
    AgentStatusChange,
    /// Agent failed.
    AgentError,
    /// Scan started.
    ScanStarted,
    /// Scan progress update.
    ScanProgress,
    /// One scan phase finished.
    ScanPhaseComplete,
    /// Scan finished.
    ScanCompleted,
    /// Scan failed.
    ScanError,
    /// Tool execution started.
    ToolStarted,
    /// Tool produced output.
    ToolOutput,
    /// Tool execution finished.
    ToolCompleted,
    /// Tool execution failed.
    ToolError,
    /// New vulnerability discovered.
    VulnerabilityFound,
    /// Existing vulnerability changed.
    VulnerabilityUpdated,
    /// Informational system notification.
    SystemNotification,
    /// System alert.
    SystemAlert,
    /// Backend resource usage sample.
    SystemResourceUsage,
}

impl CatalogEvent {
    /// All catalog entries, in wire-documentation order.
    pub const ALL: [Self; 21] = [
        Self::Connection,
        Self::Authenticated,
        Self::Error,
        Self::AgentMessage,
        Self::AgentResponse,
        Self::AgentStatusChange,
        Self::AgentError,
        Self::ScanStarted,
        Self::ScanProgress,
        Self::ScanPhaseComplete,
        Self::ScanCompleted,
        Self::ScanError,
        Self::ToolStarted,
        Self::ToolOutput,
        Self::ToolCompleted,
        Self::ToolError,
        Self::VulnerabilityFound,
        Self::VulnerabilityUpdated,
        Self::SystemNotification,
        Self::SystemAlert,
        Self::SystemResourceUsage,
    ];

    /// Returns the wire name of this event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Authenticated => "authenticated",
            Self::Error => "error",
            Self::AgentMessage => "agent:message",
            Self::AgentResponse => "agent:response",
            Self::AgentStatusChange => "agent:status_change",
            Self::AgentError => "agent:error",
            Self::ScanStarted => "scan:started",
            Self::ScanProgress => "scan:progress",
            Self::ScanPhaseComplete => "scan:phase_complete",
            Self::ScanCompleted => "scan:completed",
            Self::ScanError => "scan:error",
            Self::ToolStarted => "tool:started",
            Self::ToolOutput => "tool:output",
            Self::ToolCompleted => "tool:completed",
            Self::ToolError => "tool:error",
            Self::VulnerabilityFound => "vulnerability:found",
            Self::VulnerabilityUpdated => "vulnerability:updated",
            Self::SystemNotification => "system:notification",
            Self::SystemAlert => "system:alert",
            Self::SystemResourceUsage => "system:resource_usage",
        }
    }

    /// Looks up a catalog entry by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl AsRef<str> for CatalogEvent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CatalogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a name outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown catalog event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for CatalogEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl Serialize for CatalogEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = CatalogEvent::ALL.iter().map(|e| e.as_str()).collect();
        assert_eq!(names.len(), CatalogEvent::ALL.len());
    }

    #[test]
    fn parse_matches_as_str() {
        for event in CatalogEvent::ALL {
            let parsed: Result<CatalogEvent, _> = event.as_str().parse();
            assert_eq!(parsed, Ok(event));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let parsed = "scan:paused".parse::<CatalogEvent>();
        assert_eq!(parsed, Err(UnknownEvent("scan:paused".to_string())));
        assert_eq!(CatalogEvent::from_name("connect"), None);
    }

    #[test]
    fn serializes_as_wire_name() {
        let json = serde_json::to_string(&CatalogEvent::AgentStatusChange);
        let Ok(json) = json else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"agent:status_change\"");
    }
}
