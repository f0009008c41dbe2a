//! Timeout configuration for feed-link connections.
//!
//! Centralizes every timer the connection task and channel bindings run:
//! connection establishment, heartbeat ticks, staleness thresholds and the
//! health probe.

use std::time::Duration;

/// Timeout configuration for feed-link connections.
///
/// # Examples
///
/// ```rust
/// use feed_link::FeedLinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = FeedLinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = FeedLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .stale_connection_timeout(Duration::from_secs(120))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = FeedLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLinkTimeouts {
    /// Timeout for establishing the socket (TCP + TLS + WebSocket handshake).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Interval between heartbeat ticks while connected.
    /// Set to 0 to disable the heartbeat entirely.
    /// Default: 5 seconds
    pub heartbeat_interval: Duration,

    /// Silence after which an open connection is presumed dead and closed.
    /// Default: 30 seconds
    pub stale_connection_timeout: Duration,

    /// Silence (no channel message and no ping ack) after which a single
    /// channel binding is considered stale and rejoins.
    /// Set to 0 to disable channel-level staleness tracking.
    /// Default: 60 seconds
    pub channel_stale_timeout: Duration,

    /// How often channel bindings evaluate their own staleness.
    /// Default: 10 seconds
    pub channel_check_interval: Duration,

    /// Maximum time to wait for the reconnect health probe.
    /// Default: 5 seconds
    pub health_probe_timeout: Duration,
}

impl Default for FeedLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            stale_connection_timeout: Duration::from_secs(30),
            channel_stale_timeout: Duration::from_secs(60),
            channel_check_interval: Duration::from_secs(10),
            health_probe_timeout: Duration::from_secs(5),
        }
    }
}

impl FeedLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> FeedLinkTimeoutsBuilder {
        FeedLinkTimeoutsBuilder::new()
    }

    /// Create timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(1),
            stale_connection_timeout: Duration::from_secs(5),
            channel_stale_timeout: Duration::from_secs(10),
            channel_check_interval: Duration::from_secs(2),
            health_probe_timeout: Duration::from_secs(1),
        }
    }

    /// Create timeouts optimized for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(15),
            stale_connection_timeout: Duration::from_secs(120),
            channel_stale_timeout: Duration::from_secs(300),
            channel_check_interval: Duration::from_secs(30),
            health_probe_timeout: Duration::from_secs(15),
        }
    }

    /// Timeouts for tests that drive a paused tokio clock.
    ///
    /// Heartbeat every `tick_ms`, stale after three silent ticks.
    pub fn for_testing(tick_ms: u64) -> Self {
        Self {
            connection_timeout: Duration::from_millis(tick_ms * 10),
            heartbeat_interval: Duration::from_millis(tick_ms),
            stale_connection_timeout: Duration::from_millis(tick_ms * 3),
            channel_stale_timeout: Duration::ZERO,
            channel_check_interval: Duration::from_millis(tick_ms),
            health_probe_timeout: Duration::from_millis(tick_ms),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365) // > 1 year
    }
}

/// Builder for creating custom [`FeedLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct FeedLinkTimeoutsBuilder {
    timeouts: FeedLinkTimeouts,
}

impl FeedLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: FeedLinkTimeouts::default(),
        }
    }

    /// Set the connection establishment timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connection establishment timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the heartbeat tick interval. Set to 0 to disable.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.timeouts.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat tick interval in seconds.
    pub fn heartbeat_interval_secs(self, secs: u64) -> Self {
        self.heartbeat_interval(Duration::from_secs(secs))
    }

    /// Set the stale-connection threshold.
    pub fn stale_connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.stale_connection_timeout = timeout;
        self
    }

    /// Set the stale-connection threshold in seconds.
    pub fn stale_connection_timeout_secs(self, secs: u64) -> Self {
        self.stale_connection_timeout(Duration::from_secs(secs))
    }

    /// Set the per-channel staleness threshold. Set to 0 to disable.
    pub fn channel_stale_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.channel_stale_timeout = timeout;
        self
    }

    /// Set the per-channel staleness threshold in seconds.
    pub fn channel_stale_timeout_secs(self, secs: u64) -> Self {
        self.channel_stale_timeout(Duration::from_secs(secs))
    }

    /// Set how often channel bindings check their staleness.
    pub fn channel_check_interval(mut self, interval: Duration) -> Self {
        self.timeouts.channel_check_interval = interval;
        self
    }

    /// Set the health probe timeout.
    pub fn health_probe_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.health_probe_timeout = timeout;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> FeedLinkTimeouts {
        self.timeouts
    }
}
