//! Event service: the public face of the real-time client.
//!
//! [`EventService`] owns the handler registry and at most one session task.
//! Handlers survive automatic reconnects but are all dropped by
//! [`EventService::disconnect`]; callers re-register after a full
//! disconnect/connect cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ClientConfig, validate_url};
use crate::domain::{
    CatalogEvent, ConnectionNotice, ConnectionState, DisconnectReason, EventHandler,
    EventRegistry,
};
use crate::error::ClientError;
use crate::ws::connection::{SessionContext, run_session};
use crate::ws::{Connector, ResourceKind, SubscriptionRequest, WebSocketConnector, WireMessage};

#[derive(Debug)]
struct Session {
    id: uuid::Uuid,
    outbound: mpsc::UnboundedSender<WireMessage>,
    task: JoinHandle<()>,
}

/// Real-time event client.
///
/// Construct one per backend and share it by reference or `Arc`. All
/// methods take `&self`.
#[derive(Debug)]
pub struct EventService {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<EventRegistry>,
    state: Arc<watch::Sender<ConnectionState>>,
    generation: Arc<AtomicU64>,
    session: Mutex<Option<Session>>,
}

impl EventService {
    /// Creates a service that connects over WebSocket.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Creates a service with a custom transport.
    #[must_use]
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            connector,
            registry: Arc::new(EventRegistry::new()),
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(None),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts a session unless one is already alive.
    ///
    /// The session runs on the current Tokio runtime and reconnects on its
    /// own according to [`ClientConfig::reconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for a non-WebSocket endpoint and
    /// [`ClientError::NoRuntime`] when called outside a Tokio runtime.
    pub fn connect(&self) -> Result<(), ClientError> {
        validate_url(&self.config.ws_url)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let mut slot = self.lock_session();
        if let Some(session) = slot.as_ref()
            && self.state().is_active()
            && !session.task.is_finished()
        {
            tracing::debug!(session = %session.id, state = %self.state(), "session already running");
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let id = uuid::Uuid::new_v4();
        let ctx = SessionContext {
            id,
            generation,
            current: Arc::clone(&self.generation),
            state: Arc::clone(&self.state),
            registry: Arc::clone(&self.registry),
            connector: Arc::clone(&self.connector),
            url: self.config.ws_url.clone(),
            policy: self.config.reconnect,
            connect_timeout: self.config.connect_timeout,
        };

        self.state.send_replace(ConnectionState::Connecting);
        let span = tracing::info_span!("session", id = %id);
        let task = runtime.spawn(run_session(ctx, outbound_rx).instrument(span));
        tracing::info!(session = %id, url = %self.config.ws_url, "connecting");

        if let Some(old) = slot.replace(Session { id, outbound, task }) {
            old.task.abort();
        }
        Ok(())
    }

    /// Tears down the session and drops every registered handler.
    ///
    /// Safe to call in any state. Frames not yet written are abandoned.
    pub fn disconnect(&self) {
        let previous = self.lock_session().take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = &previous {
            session.task.abort();
        }

        let was = self.state.send_replace(ConnectionState::Idle);
        if was.is_connected() {
            let notice = ConnectionNotice::down(DisconnectReason::ClientDisconnect);
            self.registry
                .dispatch(CatalogEvent::Connection.as_str(), &notice.to_value());
        }

        let cleared = self.registry.event_count();
        self.registry.clear();
        tracing::info!(
            session = ?previous.map(|s| s.id),
            previous_state = %was,
            cleared_events = cleared,
            "disconnected"
        );
    }

    /// Registers `handler` for `event`. Re-registering the same handler is
    /// a no-op.
    pub fn on(&self, event: impl AsRef<str>, handler: EventHandler) {
        self.registry.on(event, handler);
    }

    /// Removes `handler` from `event`.
    pub fn off(&self, event: impl AsRef<str>, handler: &EventHandler) {
        self.registry.off(event, handler);
    }

    /// Sends an event to the server.
    ///
    /// Returns `false` (and logs) when not connected. Nothing is buffered.
    pub fn send(&self, event: impl Into<String>, payload: Value) -> bool {
        self.send_message(WireMessage::outbound(event, payload))
    }

    fn send_message(&self, msg: WireMessage) -> bool {
        let state = self.state();
        if !state.is_connected() {
            tracing::error!(event = %msg.event, state = %state, "not connected, cannot send event");
            return false;
        }
        let event = msg.event.clone();
        let slot = self.lock_session();
        match slot.as_ref() {
            Some(session) if session.outbound.send(msg).is_ok() => true,
            _ => {
                tracing::error!(event = %event, "session gone, cannot send event");
                false
            }
        }
    }

    /// Asks the server to deliver updates for `(kind, id)`.
    pub fn subscribe(&self, kind: ResourceKind, id: impl Into<String>) -> bool {
        self.send_message(SubscriptionRequest::new(kind, id).subscribe_message())
    }

    /// Asks the server to stop delivering updates for `(kind, id)`.
    pub fn unsubscribe(&self, kind: ResourceKind, id: impl Into<String>) -> bool {
        self.send_message(SubscriptionRequest::new(kind, id).unsubscribe_message())
    }

    /// Subscribes to a scan.
    pub fn subscribe_to_scan(&self, scan_id: impl Into<String>) -> bool {
        self.subscribe(ResourceKind::Scan, scan_id)
    }

    /// Unsubscribes from a scan.
    pub fn unsubscribe_from_scan(&self, scan_id: impl Into<String>) -> bool {
        self.unsubscribe(ResourceKind::Scan, scan_id)
    }

    /// Subscribes to an agent.
    pub fn subscribe_to_agent(&self, agent_id: impl Into<String>) -> bool {
        self.subscribe(ResourceKind::Agent, agent_id)
    }

    /// Unsubscribes from an agent.
    pub fn unsubscribe_from_agent(&self, agent_id: impl Into<String>) -> bool {
        self.unsubscribe(ResourceKind::Agent, agent_id)
    }

    /// Returns `true` while the transport is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Number of handlers registered under `event`.
    #[must_use]
    pub fn handler_count(&self, event: impl AsRef<str>) -> usize {
        self.registry.handler_count(event)
    }

    /// Number of event names with at least one handler.
    #[must_use]
    pub fn registered_events(&self) -> usize {
        self.registry.event_count()
    }
}

impl Drop for EventService {
    fn drop(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(session) = self.lock_session().take() {
            session.task.abort();
        }
    }
}
