//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                 | Default               |
//! |--------------------------|-----------------------|
//! | `WS_URL`                 | `ws://localhost:8888` |
//! | `WS_RECONNECT_ATTEMPTS`  | `5`                   |
//! | `WS_RECONNECT_DELAY_MS`  | `1000`                |
//! | `WS_CONNECT_TIMEOUT_MS`  | `20000`               |

use std::time::Duration;

use crate::error::ClientError;

/// Default backend endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8888";

/// Bounded, fixed-delay reconnection policy.
///
/// After a link drops (or the first open fails), the session makes at most
/// `max_attempts` further opens, waiting `delay` before each one. A
/// successful open resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum consecutive reconnection attempts. `0` disables reconnection.
    pub max_attempts: u32,
    /// Fixed wait before every reconnection attempt.
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1000),
        }
    }
}

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend WebSocket endpoint (`ws://` or `wss://`).
    pub ws_url: String,

    /// Reconnection policy applied after drops.
    pub reconnect: ReconnectPolicy,

    /// Upper bound on a single transport open.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_millis(20_000),
        }
    }
}

impl ClientConfig {
    /// Creates a config for `ws_url` with default policy values.
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `WS_URL` is set to something
    /// other than a `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable numeric values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ws_url = lookup("WS_URL").unwrap_or(defaults.ws_url);
        validate_url(&ws_url)?;

        let max_attempts = parse_value(
            lookup("WS_RECONNECT_ATTEMPTS"),
            defaults.reconnect.max_attempts,
        );
        let delay_ms = parse_value(lookup("WS_RECONNECT_DELAY_MS"), 1000_u64);
        let timeout_ms = parse_value(lookup("WS_CONNECT_TIMEOUT_MS"), 20_000_u64);

        Ok(Self {
            ws_url,
            reconnect: ReconnectPolicy {
                max_attempts,
                delay: Duration::from_millis(delay_ms),
            },
            connect_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Checks that `url` uses a WebSocket scheme and names a host.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUrl`] otherwise.
pub fn validate_url(url: &str) -> Result<(), ClientError> {
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| ClientError::InvalidUrl(url.to_string()))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ClientError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Parses `raw` as `T`, returning `default` on missing or invalid values.
fn parse_value<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
