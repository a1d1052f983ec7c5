//! In-process connector with scripted outcomes.
//!
//! Each call to [`Connector::open`] consumes the next scripted outcome. An
//! accepted open hands the server side of the link to the test as a
//! [`MemoryPeer`]. With an empty script every open is refused.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::{sink, stream};
use serde_json::Value;
use tokio::sync::mpsc;

use super::messages::WireMessage;
use super::transport::{Connector, Link};
use crate::error::ClientError;

#[derive(Debug)]
enum Outcome {
    Accept,
    Refuse(String),
}

#[derive(Debug, Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    opens: usize,
    urls: Vec<String>,
}

/// Scripted in-memory [`Connector`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<Script>>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// Creates a connector with an empty script.
    #[must_use]
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            peers_tx,
            peers_rx: Arc::new(tokio::sync::Mutex::new(peers_rx)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a successful open.
    pub fn accept_next(&self) -> &Self {
        self.lock().outcomes.push_back(Outcome::Accept);
        self
    }

    /// Queues a refused open.
    pub fn refuse_next(&self, reason: impl Into<String>) -> &Self {
        self.lock().outcomes.push_back(Outcome::Refuse(reason.into()));
        self
    }

    /// Total number of opens attempted so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().opens
    }

    /// URLs passed to each open, in order.
    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().urls.clone()
    }

    /// Waits for the server side of the next accepted link.
    pub async fn next_peer(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    fn accept(&self) -> Link {
        let (to_client, from_server) = mpsc::unbounded_channel::<Result<WireMessage, ClientError>>();
        let (to_server, from_client) = mpsc::unbounded_channel::<WireMessage>();

        let inbound = stream::unfold(from_server, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let outbound = sink::unfold(to_server, |tx, msg: WireMessage| async move {
            tx.send(msg)
                .map_err(|_| ClientError::Transport("peer went away".to_string()))?;
            Ok::<_, ClientError>(tx)
        });

        // A failed hand-off only means nobody is watching for peers.
        let _ = self.peers_tx.send(MemoryPeer {
            to_client,
            from_client,
        });

        Link::new(Box::pin(inbound), Box::pin(outbound))
    }
}

impl Connector for MemoryConnector {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Link, ClientError>> {
        Box::pin(async move {
            let outcome = {
                let mut script = self.lock();
                script.opens += 1;
                script.urls.push(url.to_string());
                script.outcomes.pop_front()
            };
            match outcome {
                Some(Outcome::Accept) => Ok(self.accept()),
                Some(Outcome::Refuse(reason)) => Err(ClientError::Transport(reason)),
                None => Err(ClientError::Transport("connection refused".to_string())),
            }
        })
    }
}

/// Server side of an in-memory link.
///
/// Dropping the peer ends the client's inbound stream (a transport close).
#[derive(Debug)]
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Result<WireMessage, ClientError>>,
    from_client: mpsc::UnboundedReceiver<WireMessage>,
}

impl MemoryPeer {
    /// Pushes an event to the client. Returns `false` if the link is gone.
    pub fn push(&self, event: impl Into<String>, data: Value) -> bool {
        self.to_client
            .send(Ok(WireMessage::new(event, data)))
            .is_ok()
    }

    /// Ends the link with a read error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.to_client
            .send(Err(ClientError::Transport(reason.into())))
            .is_ok()
    }

    /// Ends the link as if the server sent a close frame.
    pub fn close(&self) -> bool {
        self.to_client.send(Err(ClientError::ClosedByServer)).is_ok()
    }

    /// Waits for the next frame written by the client.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.from_client.recv().await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn empty_script_refuses() {
        let connector = MemoryConnector::new();
        let result = connector.open("ws://memory").await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
        assert_eq!(connector.open_count(), 1);
    }

    #[tokio::test]
    async fn accepted_link_carries_frames_both_ways() {
        let connector = MemoryConnector::new();
        connector.accept_next();

        let Ok(mut link) = connector.open("ws://memory").await else {
            panic!("expected scripted accept");
        };
        let Some(mut peer) = connector.next_peer().await else {
            panic!("expected a peer");
        };

        assert!(peer.push("scan:started", json!({"id": "s1"})));
        let Some(Ok(inbound)) = link.inbound.next().await else {
            panic!("expected inbound frame");
        };
        assert_eq!(inbound.event, "scan:started");

        let sent = link
            .outbound
            .send(WireMessage::new("subscribe", json!({"type": "scan", "id": "s1"})))
            .await;
        assert!(sent.is_ok());
        let Some(outbound) = peer.recv().await else {
            panic!("expected outbound frame");
        };
        assert_eq!(outbound.event, "subscribe");
    }

    #[tokio::test]
    async fn dropping_peer_ends_stream() {
        let connector = MemoryConnector::new();
        connector.accept_next();
        let Ok(mut link) = connector.open("ws://memory").await else {
            panic!("expected scripted accept");
        };
        drop(connector.next_peer().await);
        assert!(link.inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let connector = MemoryConnector::new();
        connector.refuse_next("down for maintenance").accept_next();

        let first = connector.open("ws://a").await;
        let Err(ClientError::Transport(reason)) = first else {
            panic!("expected refusal first");
        };
        assert_eq!(reason, "down for maintenance");
        assert!(connector.open("ws://b").await.is_ok());
        assert_eq!(connector.opened_urls(), vec!["ws://a", "ws://b"]);
    }
}
