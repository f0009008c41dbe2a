//! Shared WebSocket connection management.
//!
//! This module contains:
//! - [`manager`]: [`ConnectionManager`] (owner) and [`ConnectionHandle`]
//!   (cloneable API) around one background connection task per endpoint

pub mod manager;

pub use manager::{ConnectionHandle, ConnectionManager, ConnectionManagerBuilder};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default capacity for per-binding message channels.
pub(crate) const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 8192;

/// Maximum text message size (64 MiB).
pub(crate) const MAX_WS_TEXT_MESSAGE_BYTES: usize = 64 << 20;

/// Upper bound on a graceful close handshake before the socket is dropped.
pub(crate) const SOCKET_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A duration far enough in the future (~100 years) to act as "never" for
/// deadline calculations without overflowing `Instant::now() + dur`.
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Current time in millis since Unix epoch.
#[inline]
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
