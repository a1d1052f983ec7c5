//! # hexstrike-realtime
//!
//! Real-time event client for the HexStrike security platform backend.
//!
//! The client keeps one bidirectional connection to the backend and fans a
//! fixed catalog of server-pushed events (scan, tool, agent, vulnerability,
//! and system updates) out to local handlers. It reconnects after drops and
//! sends advisory subscribe/unsubscribe messages so the server only
//! delivers updates for the scans and agents the caller cares about.
//!
//! ## Architecture
//!
//! ```text
//! Application code
//!     │  on / off / send / subscribe_to_scan / ...
//!     ├── EventService (service/)
//!     │
//!     ├── EventRegistry ◄── Bridge ◄── CatalogEvent table (domain/)
//!     │                       ▲
//!     ├── Session task (ws/connection)
//!     │      reconnection policy, outbound queue
//!     │
//!     └── Connector (ws/transport)
//!            WebSocketConnector │ MemoryConnector
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hexstrike_realtime::{CatalogEvent, ClientConfig, EventService, handler};
//!
//! # async fn run() -> Result<(), hexstrike_realtime::ClientError> {
//! let service = EventService::new(ClientConfig::from_env()?);
//! service.on(
//!     CatalogEvent::ScanProgress,
//!     handler(|payload| println!("progress: {payload}")),
//! );
//! service.connect()?;
//! service.subscribe_to_scan("scan-42");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;

pub use config::{ClientConfig, ReconnectPolicy};
pub use domain::{CatalogEvent, ConnectionState, EventHandler, handler};
pub use error::ClientError;
pub use service::EventService;
pub use ws::ResourceKind;
