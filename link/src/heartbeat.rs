//! Liveness checks for an open connection.
//!
//! [`HeartbeatMonitor`] holds no timers and touches no socket. The connection
//! task calls [`tick`](HeartbeatMonitor::tick) on its heartbeat interval and
//! acts on the returned [`HeartbeatAction`].

use std::time::Duration;

use tokio::time::Instant;

/// What the connection task should do after a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Host network is offline; liveness was not evaluated.
    Skip,
    /// No inbound traffic for longer than the stale timeout. Close the socket
    /// and hand over to the reconnect path.
    ForceClose,
    /// Connection is live; send the configured keepalive.
    Keepalive,
    /// Nothing to do.
    Idle,
}

/// Tracks time since the last inbound frame of an open connection.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    stale_after: Duration,
    send_keepalive: bool,
    last_message: Instant,
    stale_reported: bool,
}

impl HeartbeatMonitor {
    pub fn new(stale_after: Duration, send_keepalive: bool, now: Instant) -> Self {
        Self {
            stale_after,
            send_keepalive,
            last_message: now,
            stale_reported: false,
        }
    }

    /// Start a fresh liveness window, e.g. right after an open.
    pub fn reset(&mut self, now: Instant) {
        self.last_message = now;
        self.stale_reported = false;
    }

    /// Any inbound frame counts, including pongs and protocol noise.
    pub fn record_message(&mut self, now: Instant) {
        self.last_message = now;
        self.stale_reported = false;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_message)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        !self.stale_after.is_zero() && self.elapsed(now) > self.stale_after
    }

    /// Evaluate one tick.
    ///
    /// A continuous stale period yields [`HeartbeatAction::ForceClose`] once;
    /// later ticks in the same period return [`HeartbeatAction::Idle`] until
    /// a message or a reset starts a new window.
    pub fn tick(&mut self, now: Instant, network_online: bool) -> HeartbeatAction {
        if !network_online {
            return HeartbeatAction::Skip;
        }

        if self.is_stale(now) {
            if self.stale_reported {
                return HeartbeatAction::Idle;
            }
            self.stale_reported = true;
            return HeartbeatAction::ForceClose;
        }

        if self.send_keepalive {
            HeartbeatAction::Keepalive
        } else {
            HeartbeatAction::Idle
        }
    }
}
