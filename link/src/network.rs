//! Host network health signal.
//!
//! The heartbeat skips its liveness check while the host reports itself
//! offline, so a laptop closing its lid does not burn through the reconnect
//! budget. The embedding application owns the signal and flips it from
//! whatever OS hook it has.

use tokio::sync::watch;

/// Shared online/offline flag read by the connection task on every tick.
///
/// Clones observe and update the same flag.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Report a host network transition. Repeated values are ignored.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                log::info!(
                    "[feed-link] Host network reported {}",
                    if online { "online" } else { "offline" }
                );
                *current = online;
                true
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receive every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_online() {
        assert!(NetworkMonitor::default().is_online());
    }

    #[test]
    fn test_clones_share_state() {
        let monitor = NetworkMonitor::default();
        let other = monitor.clone();
        other.set_online(false);
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
