//! Bridge from transport frames into the local registry.
//!
//! Each [`CatalogEvent`] has exactly one [`Binding`]. Frames whose name is
//! outside the catalog stop here and never reach a handler.

use std::sync::Arc;

use serde_json::Value;

use super::{CatalogEvent, EventRegistry};

/// How an inbound frame for a catalog entry is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Dispatch the payload unchanged under the same name.
    Forward,
    /// Forward, and mark the connection as authenticated.
    ForwardAndAuthenticate,
    /// Synthesized by the client; server frames with this name are dropped.
    LocalOnly,
}

impl Binding {
    /// Returns the binding for a catalog entry.
    #[must_use]
    pub const fn of(event: CatalogEvent) -> Self {
        match event {
            CatalogEvent::Connection => Self::LocalOnly,
            CatalogEvent::Authenticated => Self::ForwardAndAuthenticate,
            CatalogEvent::Error
            | CatalogEvent::AgentMessage
            | CatalogEvent::AgentResponse
            | CatalogEvent::AgentStatusChange
            | CatalogEvent::AgentError
            | CatalogEvent::ScanStarted
            | CatalogEvent::ScanProgress
            | CatalogEvent::ScanPhaseComplete
            | CatalogEvent::ScanCompleted
            | CatalogEvent::ScanError
            | CatalogEvent::ToolStarted
            | CatalogEvent::ToolOutput
            | CatalogEvent::ToolCompleted
            | CatalogEvent::ToolError
            | CatalogEvent::VulnerabilityFound
            | CatalogEvent::VulnerabilityUpdated
            | CatalogEvent::SystemNotification
            | CatalogEvent::SystemAlert
            | CatalogEvent::SystemResourceUsage => Self::Forward,
        }
    }
}

/// Full bridge table, one row per catalog entry.
#[must_use]
pub fn table() -> [(CatalogEvent, Binding); 21] {
    CatalogEvent::ALL.map(|event| (event, Binding::of(event)))
}

/// Outcome of handing one inbound frame to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Dispatched to `handlers` handlers.
    Forwarded {
        /// Catalog entry that matched.
        event: CatalogEvent,
        /// Handlers that completed normally.
        handlers: usize,
    },
    /// `authenticated` was dispatched after the authenticate hook ran.
    Authenticated {
        /// Handlers that completed normally.
        handlers: usize,
    },
    /// Name is in the catalog but reserved for local synthesis.
    ReservedName,
    /// Name is not in the catalog.
    Unknown,
}

/// Forwards catalog frames into an [`EventRegistry`].
#[derive(Debug, Clone)]
pub struct Bridge {
    registry: Arc<EventRegistry>,
}

impl Bridge {
    /// Binds a bridge to `registry`.
    #[must_use]
    pub fn new(registry: Arc<EventRegistry>) -> Self {
        Self { registry }
    }

    /// Routes one inbound frame.
    ///
    /// For `authenticated`, `on_authenticated` runs before any handler so
    /// handlers observe the updated connection state.
    pub fn deliver(
        &self,
        name: &str,
        payload: &Value,
        on_authenticated: impl FnOnce(),
    ) -> Delivery {
        let Some(event) = CatalogEvent::from_name(name) else {
            return Delivery::Unknown;
        };
        match Binding::of(event) {
            Binding::LocalOnly => Delivery::ReservedName,
            Binding::Forward => Delivery::Forwarded {
                event,
                handlers: self.registry.dispatch(event.as_str(), payload),
            },
            Binding::ForwardAndAuthenticate => {
                on_authenticated();
                Delivery::Authenticated {
                    handlers: self.registry.dispatch(event.as_str(), payload),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::domain::registry::handler;

    #[test]
    fn table_covers_catalog() {
        let rows = table();
        assert_eq!(rows.len(), CatalogEvent::ALL.len());
        let local: Vec<_> = rows
            .iter()
            .filter(|(_, b)| *b == Binding::LocalOnly)
            .map(|(e, _)| *e)
            .collect();
        assert_eq!(local, vec![CatalogEvent::Connection]);
    }

    #[test]
    fn forwards_payload_unchanged() {
        let registry = Arc::new(EventRegistry::new());
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        registry.on(
            "scan:progress",
            handler(move |p| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(p.clone());
                }
            }),
        );

        let bridge = Bridge::new(Arc::clone(&registry));
        let delivery = bridge.deliver("scan:progress", &json!({"percent": 42}), || {});
        assert_eq!(
            delivery,
            Delivery::Forwarded {
                event: CatalogEvent::ScanProgress,
                handlers: 1
            }
        );
        let got = seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(got, Some(json!({"percent": 42})));
    }

    #[test]
    fn authenticated_is_flagged() {
        let registry = Arc::new(EventRegistry::new());
        let bridge = Bridge::new(registry);
        assert_eq!(
            bridge.deliver("authenticated", &json!({"user": "op"}), || {}),
            Delivery::Authenticated { handlers: 0 }
        );
    }

    #[test]
    fn authenticate_hook_runs_before_handlers() {
        let registry = Arc::new(EventRegistry::new());
        let flag = Arc::new(AtomicBool::new(false));
        let saw_flag = Arc::new(AtomicBool::new(false));
        let (f, s) = (Arc::clone(&flag), Arc::clone(&saw_flag));
        registry.on(
            "authenticated",
            handler(move |_| s.store(f.load(Ordering::SeqCst), Ordering::SeqCst)),
        );

        let bridge = Bridge::new(registry);
        let hook_flag = Arc::clone(&flag);
        let delivery = bridge.deliver("authenticated", &json!({}), || {
            hook_flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(delivery, Delivery::Authenticated { handlers: 1 });
        assert!(saw_flag.load(Ordering::SeqCst));
    }

    #[test]
    fn hook_is_skipped_for_other_events() {
        let bridge = Bridge::new(Arc::new(EventRegistry::new()));
        let called = AtomicBool::new(false);
        bridge.deliver("scan:started", &json!({}), || called.store(true, Ordering::SeqCst));
        bridge.deliver("connection", &json!({}), || called.store(true, Ordering::SeqCst));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn reserved_and_unknown_names_are_dropped() {
        let registry = Arc::new(EventRegistry::new());
        let count = Arc::new(AtomicUsize::new(0));
        for name in ["connection", "custom:thing"] {
            let c = Arc::clone(&count);
            registry.on(
                name,
                handler(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        let bridge = Bridge::new(registry);
        assert_eq!(
            bridge.deliver("connection", &json!({"connected": true}), || {}),
            Delivery::ReservedName
        );
        assert_eq!(bridge.deliver("custom:thing", &json!(1), || {}), Delivery::Unknown);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
