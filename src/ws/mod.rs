//! WebSocket layer: transport seam, wire envelope, session task, and the
//! resource subscription protocol.
//!
//! The session task in [`connection`] owns the link and feeds inbound
//! frames through the domain bridge; everything above it only sees
//! [`messages::WireMessage`] values.

pub mod connection;
pub mod memory;
pub mod messages;
pub mod subscription;
pub mod transport;

pub use memory::{MemoryConnector, MemoryPeer};
pub use messages::WireMessage;
pub use subscription::{ResourceKind, SubscriptionRequest};
pub use transport::{Connector, Link, WebSocketConnector};
