//! Domain layer: event catalog, bridge, local registry, and connection
//! state.
//!
//! Nothing in here touches the network. The `ws` layer feeds frames into
//! the [`Bridge`], which dispatches through the [`EventRegistry`].

pub mod bridge;
pub mod catalog;
pub mod connection_state;
pub mod registry;

pub use bridge::{Binding, Bridge, Delivery};
pub use catalog::{CatalogEvent, UnknownEvent};
pub use connection_state::{ConnectionNotice, ConnectionState, DisconnectReason};
pub use registry::{EventHandler, EventRegistry, handler};
