//! Session task: the connection manager's state machine.
//!
//! One task per `connect()`. It opens a link, bridges inbound frames into
//! the registry, writes queued outbound frames, and on a drop applies the
//! bounded fixed-delay reconnection policy. Every write to shared state is
//! guarded by the session generation, so a task orphaned by
//! `disconnect()` cannot touch the state or registry again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};

use super::messages::WireMessage;
use super::transport::{Connector, Link};
use crate::config::ReconnectPolicy;
use crate::domain::{
    Bridge, CatalogEvent, ConnectionNotice, ConnectionState, Delivery, DisconnectReason,
    EventRegistry,
};
use crate::error::ClientError;

/// Everything a session task needs, captured at `connect()` time.
#[derive(Debug)]
pub struct SessionContext {
    /// Session id used in log spans.
    pub id: uuid::Uuid,
    /// Generation this session was started with.
    pub generation: u64,
    /// Current generation; bumped by `disconnect()`.
    pub current: Arc<AtomicU64>,
    /// Shared state publisher.
    pub state: Arc<watch::Sender<ConnectionState>>,
    /// Shared handler registry.
    pub registry: Arc<EventRegistry>,
    /// Transport factory.
    pub connector: Arc<dyn Connector>,
    /// Endpoint.
    pub url: String,
    /// Reconnection policy.
    pub policy: ReconnectPolicy,
    /// Bound on a single open.
    pub connect_timeout: Duration,
}

impl SessionContext {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Publishes `next` unless the session has been superseded.
    fn set_state(&self, next: ConnectionState) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.current.load(Ordering::SeqCst) != self.generation {
                return false;
            }
            applied = true;
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        applied
    }

    fn notify(&self, notice: ConnectionNotice) {
        if self.is_current() {
            self.registry
                .dispatch(CatalogEvent::Connection.as_str(), &notice.to_value());
        }
    }

    async fn open(&self) -> Result<Link, ClientError> {
        match tokio::time::timeout(self.connect_timeout, self.connector.open(&self.url)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectTimeout {
                timeout_ms: u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    fn deliver(&self, bridge: &Bridge, msg: &WireMessage) {
        let authenticate = || {
            self.state.send_if_modified(|state| {
                if self.current.load(Ordering::SeqCst) != self.generation
                    || *state != ConnectionState::Connected
                {
                    return false;
                }
                *state = ConnectionState::Authenticated;
                true
            });
        };
        match bridge.deliver(&msg.event, &msg.data, authenticate) {
            Delivery::Forwarded {
                event: CatalogEvent::Error,
                handlers,
            } => {
                tracing::warn!(payload = %msg.data, handlers, "server reported an error");
            }
            Delivery::Forwarded { event, handlers } => {
                tracing::trace!(event = %event, handlers, "dispatched");
            }
            Delivery::Authenticated { handlers } => {
                tracing::info!(handlers, "authenticated");
            }
            Delivery::ReservedName => {
                tracing::debug!(event = %msg.event, "dropping server frame with a reserved name");
            }
            Delivery::Unknown => {
                tracing::debug!(event = %msg.event, "dropping event outside the catalog");
            }
        }
    }
}

/// Runs one session until the policy gives up or the session is superseded.
pub async fn run_session(ctx: SessionContext, mut outbound_rx: mpsc::UnboundedReceiver<WireMessage>) {
    let bridge = Bridge::new(Arc::clone(&ctx.registry));
    let mut failures: u32 = 0;

    loop {
        if !ctx.set_state(ConnectionState::Connecting) {
            return;
        }
        tracing::debug!(url = %ctx.url, attempt = failures, "opening transport");

        match ctx.open().await {
            Ok(link) => {
                failures = 0;
                let stale = discard_queued(&mut outbound_rx);
                if stale > 0 {
                    tracing::warn!(
                        dropped = stale,
                        "discarding frames queued before the link dropped"
                    );
                }
                if !ctx.set_state(ConnectionState::Connected) {
                    return;
                }
                tracing::info!(url = %ctx.url, "connected");
                ctx.notify(ConnectionNotice::up());

                let reason = drive_link(&ctx, &bridge, link, &mut outbound_rx).await;
                if !ctx.is_current() {
                    return;
                }
                tracing::warn!(reason = %reason, "disconnected");
                ctx.set_state(ConnectionState::Disconnected);
                ctx.notify(ConnectionNotice::down(reason));
                if reason == DisconnectReason::ClientDisconnect {
                    ctx.set_state(ConnectionState::Idle);
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(
                    url = %ctx.url,
                    error = %e,
                    code = e.error_code(),
                    transport = e.is_transport(),
                    attempt = failures,
                    "connect failed"
                );
            }
        }

        if failures >= ctx.policy.max_attempts {
            tracing::error!(
                attempts = failures,
                max_attempts = ctx.policy.max_attempts,
                "reconnection attempts exhausted"
            );
            ctx.set_state(ConnectionState::Idle);
            return;
        }
        failures += 1;
        if !ctx.set_state(ConnectionState::Disconnected) {
            return;
        }
        tokio::time::sleep(ctx.policy.delay).await;
    }
}

/// Pumps one link until it drops. Returns why it dropped.
async fn drive_link(
    ctx: &SessionContext,
    bridge: &Bridge,
    link: Link,
    outbound_rx: &mut mpsc::UnboundedReceiver<WireMessage>,
) -> DisconnectReason {
    let Link {
        mut inbound,
        mut outbound,
    } = link;

    loop {
        tokio::select! {
            frame = inbound.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        if !ctx.is_current() {
                            return DisconnectReason::ClientDisconnect;
                        }
                        ctx.deliver(bridge, &msg);
                    }
                    Some(Err(ClientError::ClosedByServer)) => {
                        return DisconnectReason::ServerDisconnect;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "transport read failed");
                        return DisconnectReason::TransportError;
                    }
                    None => return DisconnectReason::TransportClose,
                }
            }
            out = outbound_rx.recv() => {
                match out {
                    Some(msg) => {
                        let event = msg.event.clone();
                        if let Err(e) = outbound.send(msg).await {
                            tracing::warn!(event = %event, error = %e, "transport write failed");
                            return DisconnectReason::TransportError;
                        }
                    }
                    None => return DisconnectReason::ClientDisconnect,
                }
            }
        }
    }
}

fn discard_queued(rx: &mut mpsc::UnboundedReceiver<WireMessage>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::handler;
    use crate::ws::memory::MemoryConnector;

    struct Harness {
        connector: MemoryConnector,
        state_rx: watch::Receiver<ConnectionState>,
        registry: Arc<EventRegistry>,
        current: Arc<AtomicU64>,
        outbound_tx: mpsc::UnboundedSender<WireMessage>,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(max_attempts: u32) -> Harness {
        let connector = MemoryConnector::new();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let registry = Arc::new(EventRegistry::new());
        let current = Arc::new(AtomicU64::new(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let ctx = SessionContext {
            id: uuid::Uuid::new_v4(),
            generation: 1,
            current: Arc::clone(&current),
            state: Arc::new(state_tx),
            registry: Arc::clone(&registry),
            connector: Arc::new(connector.clone()),
            url: "ws://memory".to_string(),
            policy: ReconnectPolicy {
                max_attempts,
                delay: Duration::from_millis(1),
            },
            connect_timeout: Duration::from_secs(1),
        };
        // Script before spawning: the task opens immediately.
        connector.accept_next();
        let task = tokio::spawn(run_session(ctx, outbound_rx));
        Harness {
            connector,
            state_rx,
            registry,
            current,
            outbound_tx,
            task,
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
        let reached = matches!(
            tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == want)).await,
            Ok(Ok(_))
        );
        assert!(reached, "state never became {want}, is {}", *rx.borrow());
    }

    #[tokio::test]
    async fn exhausts_policy_then_idles() {
        let mut h = start(3);
        let Some(peer) = h.connector.next_peer().await else {
            panic!("expected first link");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;

        drop(peer);
        wait_for(&mut h.state_rx, ConnectionState::Idle).await;
        let joined = tokio::time::timeout(Duration::from_secs(2), h.task).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert_eq!(h.connector.open_count(), 4);
    }

    #[tokio::test]
    async fn reconnects_after_drop_and_resets_budget() {
        let mut h = start(1);
        let Some(first) = h.connector.next_peer().await else {
            panic!("expected first link");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;

        h.connector.accept_next();
        assert!(first.fail("reset by peer"));
        let Some(second) = h.connector.next_peer().await else {
            panic!("expected reconnect link");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;

        h.connector.accept_next();
        assert!(second.close());
        let Some(_third) = h.connector.next_peer().await else {
            panic!("budget should reset after a successful open");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;
        assert_eq!(h.connector.open_count(), 3);
        h.task.abort();
    }

    #[tokio::test]
    async fn stale_generation_stops_touching_state() {
        let mut h = start(5);
        let Some(peer) = h.connector.next_peer().await else {
            panic!("expected first link");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.on(
            "scan:progress",
            handler(move |p| {
                let _ = tx.send(p.clone());
            }),
        );

        h.current.fetch_add(1, Ordering::SeqCst);
        assert!(peer.push("scan:progress", json!({"percent": 1})));
        let joined = tokio::time::timeout(Duration::from_secs(2), h.task).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(rx.try_recv().is_err());
        assert_eq!(*h.state_rx.borrow(), ConnectionState::Connected);
        assert_eq!(h.connector.open_count(), 1);
    }

    #[tokio::test]
    async fn closed_outbound_channel_ends_session() {
        let mut h = start(5);
        let Some(_peer) = h.connector.next_peer().await else {
            panic!("expected first link");
        };
        wait_for(&mut h.state_rx, ConnectionState::Connected).await;

        drop(h.outbound_tx);
        wait_for(&mut h.state_rx, ConnectionState::Idle).await;
        assert_eq!(h.connector.open_count(), 1);
    }
}
