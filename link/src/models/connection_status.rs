use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a shared connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No socket, and no retry scheduled.
    #[default]
    Disconnected,
    /// A socket is being opened.
    Connecting,
    /// Socket is open; queued traffic has been flushed.
    Connected,
    /// A close is in progress.
    Closing,
    /// Waiting out a backoff delay or a failed health probe.
    Reconnecting,
    /// The attempt cap was hit. Terminal until an explicit `connect()`.
    Abandoned,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable snapshot of a connection, published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful open.
    pub retry_count: u32,
    /// Millis since Unix epoch of the last inbound frame of any kind.
    /// Refreshed without waking status watchers.
    pub last_message_at_ms: Option<u64>,
    /// Human-readable reason for the most recent close.
    pub last_close_reason: Option<String>,
    /// Number of messages waiting for the next open.
    pub queued_messages: usize,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` once automatic reconnection has given up.
    pub fn is_abandoned(&self) -> bool {
        self.state == ConnectionState::Abandoned
    }
}
