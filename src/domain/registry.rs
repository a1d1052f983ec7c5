//! Local fan-out registry for received events.
//!
//! [`EventRegistry`] maps event names to sets of handlers. Dispatch takes a
//! snapshot of the set and releases the lock before calling anything, so a
//! handler may register or remove handlers (including itself) while it runs;
//! the change applies from the next dispatch on.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Callback invoked with an event payload.
///
/// Identity is the `Arc` allocation: keep a clone to pass to
/// [`EventRegistry::off`].
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wraps a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Event name → handler set.
#[derive(Default)]
pub struct EventRegistry {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.lock();
        let mut counts: Vec<(&str, usize)> =
            map.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        counts.sort_unstable();
        f.debug_struct("EventRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `handler` under `event`.
    ///
    /// Returns `false` if that exact handler was already registered there.
    pub fn on(&self, event: impl AsRef<str>, handler: EventHandler) -> bool {
        let event = event.as_ref();
        let mut map = self.lock();
        let entry = map.entry(event.to_string()).or_default();
        if entry.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return false;
        }
        entry.push(handler);
        true
    }

    /// Removes `handler` from `event`. Drops the entry once it is empty.
    ///
    /// Returns `true` if the handler was registered.
    pub fn off(&self, event: impl AsRef<str>, handler: &EventHandler) -> bool {
        let event = event.as_ref();
        let mut map = self.lock();
        let Some(entry) = map.get_mut(event) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = entry.len() != before;
        if entry.is_empty() {
            map.remove(event);
        }
        removed
    }

    /// Delivers `payload` to every handler registered under `event`.
    ///
    /// Handler panics are caught and logged; the remaining handlers still
    /// run. Returns the number of handlers that completed normally.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.lock().get(event) {
            Some(handlers) => handlers.iter().map(Arc::clone).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    tracing::error!(
                        event = %event,
                        error = %panic_message(panic.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Drops every handler for every event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of handlers registered under `event`.
    #[must_use]
    pub fn handler_count(&self, event: impl AsRef<str>) -> usize {
        self.lock().get(event.as_ref()).map_or(0, Vec::len)
    }

    /// Number of event names with at least one handler.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
