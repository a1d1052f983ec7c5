//! Service layer: the client's public surface.
//!
//! [`EventService`] wires the domain registry to a session task from the
//! [`super::ws`] layer and exposes connect/disconnect, handler
//! registration, sends, and resource subscriptions.

pub mod event_service;

pub use event_service::EventService;
