//! Transport seam.
//!
//! A [`Connector`] opens a [`Link`]: a stream of decoded inbound frames and
//! a sink for outbound frames. [`WebSocketConnector`] speaks JSON text
//! frames over `tokio-tungstenite`; tests and embedders can substitute
//! [`super::memory::MemoryConnector`].

use std::fmt;
use std::pin::Pin;

use futures_util::future::{self, BoxFuture};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use super::messages::WireMessage;
use crate::error::ClientError;

/// Decoded inbound frames. An `Err` ends the link.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<WireMessage, ClientError>> + Send>>;

/// Outbound frame sink.
pub type OutboundSink = Pin<Box<dyn Sink<WireMessage, Error = ClientError> + Send>>;

/// One established transport connection.
pub struct Link {
    /// Frames from the server.
    pub inbound: InboundStream,
    /// Frames to the server.
    pub outbound: OutboundSink,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

impl Link {
    /// Creates a link from already boxed halves.
    #[must_use]
    pub fn new(inbound: InboundStream, outbound: OutboundSink) -> Self {
        Self { inbound, outbound }
    }

    /// Wraps a WebSocket stream as a JSON text-frame link.
    #[must_use]
    pub fn from_websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (write, read) = ws.split();

        let inbound = read.filter_map(|frame| future::ready(decode_frame(frame)));
        let outbound = write
            .sink_map_err(|e| ClientError::Transport(e.to_string()))
            .with(|msg: WireMessage| future::ready(encode_frame(&msg)));

        Self {
            inbound: Box::pin(inbound),
            outbound: Box::pin(outbound),
        }
    }
}

/// Opens links to an endpoint.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens one link to `url`.
    ///
    /// # Errors
    ///
    /// Returns a transport [`ClientError`] when the connection cannot be
    /// established.
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Link, ClientError>>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
///
/// Only plain `ws://` endpoints work unless `tokio-tungstenite` is built with
/// one of its TLS features.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn open<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Link, ClientError>> {
        Box::pin(async move {
            let (ws, response) = tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            tracing::debug!(url = %url, status = %response.status(), "websocket handshake complete");
            Ok(Link::from_websocket(ws))
        })
    }
}

/// Maps a raw frame to an inbound item. `None` means "skip".
fn decode_frame(
    frame: Result<Message, tungstenite::Error>,
) -> Option<Result<WireMessage, ClientError>> {
    match frame {
        Ok(Message::Text(text)) => match WireMessage::from_json(text.as_str()) {
            Ok(msg) => Some(Ok(msg)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed frame");
                None
            }
        },
        Ok(Message::Close(_)) => Some(Err(ClientError::ClosedByServer)),
        Ok(_) => None,
        Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
    }
}

fn encode_frame(msg: &WireMessage) -> Result<Message, ClientError> {
    Ok(Message::text(msg.to_json()?))
}
