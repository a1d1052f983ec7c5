//! Client error types.
//!
//! [`ClientError`] is the central error type for the event client. Transport
//! variants never escape to application code through the public surface:
//! the session task recovers from them and reports drops as `connection`
//! events. Only configuration and misuse errors are returned from calls.

/// Client-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category      | Recovered by                     |
/// |-----------|---------------|----------------------------------|
/// | 1000–1999 | Configuration | caller (fix config and retry)    |
/// | 2000–2999 | Transport     | reconnection policy              |
/// | 3000–3999 | Protocol      | frame is logged and skipped      |
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),

    /// `connect()` was called outside of a Tokio runtime.
    #[error("no tokio runtime available to drive the connection")]
    NoRuntime,

    /// Transport-level failure (refused, reset, write error).
    #[error("transport error: {0}")]
    Transport(String),

    /// Server sent a close frame.
    #[error("connection closed by server")]
    ClosedByServer,

    /// Opening the transport took longer than the configured timeout.
    #[error("connect timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Frame could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidUrl(_) => 1001,
            Self::NoRuntime => 1002,
            Self::Transport(_) => 2001,
            Self::ClosedByServer => 2002,
            Self::ConnectTimeout { .. } => 2003,
            Self::Serialization(_) => 3001,
        }
    }

    /// Returns `true` if the reconnection policy handles this error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ClosedByServer | Self::ConnectTimeout { .. }
        )
    }
}
