use serde::{Deserialize, Serialize};

/// How the reconnect delay grows across consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `reconnect_delay_ms * (attempt + 1)`.
    #[default]
    Linear,
    /// `reconnect_delay_ms * 2^attempt` plus a deterministic jitter of up to 20%.
    Exponential,
}

/// What the heartbeat sends on a healthy tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "payload")]
pub enum KeepalivePayload {
    /// Send nothing; rely on server traffic for liveness.
    Disabled,
    /// WebSocket protocol-level Ping frame.
    #[default]
    Ping,
    /// Application-level text frame (e.g. `{"channel":"ping"}`).
    Text(String),
}

/// Connection-level options for the shared WebSocket.
///
/// These options control reconnection behavior:
/// - Automatic reconnection on connection loss
/// - Reconnection timing, growth strategy and retry limits
/// - Optional health probe that gates every retry
/// - Keepalive payload sent by the heartbeat
///
/// Timing of heartbeats and staleness lives in
/// [`FeedLinkTimeouts`](crate::FeedLinkTimeouts).
///
/// # Example
///
/// ```rust
/// use feed_link::{BackoffStrategy, ConnectionOptions};
///
/// let options = ConnectionOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(2000)
///     .with_backoff(BackoffStrategy::Linear)
///     .with_max_reconnect_attempts(Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Enable automatic reconnection on connection loss
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Base delay in milliseconds between reconnection attempts
    /// Default: 1000ms
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound on any single reconnect delay
    /// Default: 30000ms
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of consecutive reconnection attempts before giving up
    /// Default: Some(10)
    /// None retries forever, Some(0) disables reconnection entirely
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: Option<u32>,

    /// Delay growth strategy
    /// Default: Linear
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Keepalive sent by the heartbeat on healthy ticks
    /// Default: protocol Ping frame
    #[serde(default)]
    pub keepalive: KeepalivePayload,

    /// HTTP endpoint probed before each reconnect attempt.
    ///
    /// A non-2xx answer (or no answer within the probe timeout) postpones the
    /// attempt by the same delay instead of dialing a backend that is known
    /// to be down. Default: None (no gating)
    #[serde(default)]
    pub health_check_url: Option<String>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_reconnect_attempts() -> Option<u32> {
    Some(10)
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            backoff: BackoffStrategy::default(),
            keepalive: KeepalivePayload::default(),
            health_check_url: None,
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect on connection loss
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the base delay between reconnection attempts (in milliseconds)
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum delay between reconnection attempts (in milliseconds)
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the maximum number of reconnection attempts
    /// Pass None for infinite retries, Some(0) to disable reconnection
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    pub fn with_keepalive(mut self, keepalive: KeepalivePayload) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Gate reconnect attempts on an HTTP health endpoint.
    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }
}
