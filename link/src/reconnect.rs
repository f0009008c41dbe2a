//! Reconnect backoff and attempt cap.
//!
//! [`ReconnectPolicy`] is pure bookkeeping. The connection task asks it for
//! the next delay after every unexpected close and resets it on open.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::models::{BackoffStrategy, ConnectionOptions};

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    strategy: BackoffStrategy,
    jitter_seed: String,
    attempts: u32,
    last_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(options: &ConnectionOptions, jitter_seed: impl Into<String>) -> Self {
        Self {
            base_delay: Duration::from_millis(options.reconnect_delay_ms),
            max_delay: Duration::from_millis(options.max_reconnect_delay_ms),
            max_attempts: if options.auto_reconnect {
                options.max_reconnect_attempts
            } else {
                Some(0)
            },
            strategy: options.backoff,
            jitter_seed: jitter_seed.into(),
            attempts: 0,
            last_delay: Duration::ZERO,
        }
    }

    /// Consecutive attempts scheduled since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `None` retries forever.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_attempts, Some(max) if self.attempts >= max)
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_delay = Duration::ZERO;
    }

    /// Schedule the next attempt.
    ///
    /// Returns `None` once the attempt cap is reached; the connection is then
    /// abandoned. Consecutive delays never decrease.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let raw = match self.strategy {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(self.attempts.saturating_add(1)),
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(self.attempts.min(31)).unwrap_or(u32::MAX);
                let delay = self.base_delay.saturating_mul(factor);
                delay.saturating_add(jitter(delay, &self.jitter_seed, self.attempts))
            },
        };

        let capped = if self.max_delay.is_zero() {
            raw
        } else {
            raw.min(self.max_delay)
        };
        let delay = capped.max(self.last_delay);

        self.attempts += 1;
        self.last_delay = delay;
        Some(delay)
    }
}

/// Deterministic non-negative jitter of up to 20% of `base`.
fn jitter(base: Duration, seed: &str, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let span = base_ms / 5;
    if span == 0 {
        return Duration::ZERO;
    }

    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    attempt.hash(&mut hasher);
    Duration::from_millis(hasher.finish() % (span + 1))
}
