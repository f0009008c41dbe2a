//! Error types for feed-link.
//!
//! Transient transport failures never surface through these types to feed
//! consumers; they are absorbed by the reconnect path and reported through
//! [`ConnectionStatus`](crate::models::ConnectionStatus) and the `on_error`
//! listeners instead.

use thiserror::Error;

/// Errors returned by feed-link operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedLinkError {
    /// Invalid URL, option or builder input.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// WebSocket handshake or frame-level failure.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Lower-level network failure (DNS, TCP, TLS, HTTP probe).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// An operation exceeded its configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Outbound message could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Inbound payload could not be interpreted.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The credential provider failed to supply a credential.
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The background connection task is gone (manager dropped or shut down).
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Invariant violation inside the library.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FeedLinkError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedLinkError::WebSocketError(_)
                | FeedLinkError::NetworkError(_)
                | FeedLinkError::TimeoutError(_)
        )
    }
}

impl From<serde_json::Error> for FeedLinkError {
    fn from(err: serde_json::Error) -> Self {
        FeedLinkError::SerializationError(err.to_string())
    }
}

/// Result type for feed-link operations.
pub type Result<T> = std::result::Result<T, FeedLinkError>;
