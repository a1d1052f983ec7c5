//! hexstrike-watch entry point.
//!
//! Connects to the backend, logs every server-sent catalog event, and keeps the scan
//! and agent subscriptions listed in `WATCH_SCANS` / `WATCH_AGENTS`
//! (comma-separated ids) alive across reconnects.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use hexstrike_realtime::domain::{Binding, bridge};
use hexstrike_realtime::{CatalogEvent, ClientConfig, ConnectionState, EventService, handler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = ClientConfig::from_env()?;
    let scans = id_list("WATCH_SCANS");
    let agents = id_list("WATCH_AGENTS");
    tracing::info!(
        url = %config.ws_url,
        scans = scans.len(),
        agents = agents.len(),
        "starting hexstrike-watch"
    );

    let service = EventService::new(config);

    // Subscriptions are server-side state, so they are re-sent on every link.
    let (link_tx, mut link_rx) = mpsc::unbounded_channel::<bool>();
    service.on(
        CatalogEvent::Connection,
        handler(move |payload| {
            let up = payload
                .get("connected")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let _ = link_tx.send(up);
        }),
    );
    for (event, binding) in bridge::table() {
        if binding == Binding::LocalOnly {
            continue;
        }
        service.on(
            event,
            handler(move |payload| {
                tracing::info!(event = %event, payload = %payload, "event received");
            }),
        );
    }

    service.connect()?;
    let mut state = service.watch_state();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(up) = link_rx.recv() => {
                if up {
                    for id in &scans {
                        service.subscribe_to_scan(id.as_str());
                    }
                    for id in &agents {
                        service.subscribe_to_agent(id.as_str());
                    }
                }
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == ConnectionState::Idle {
                    tracing::error!("connection lost and reconnection gave up");
                    break;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    service.disconnect();
    Ok(())
}

/// Reads a comma-separated id list from the environment.
fn id_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
