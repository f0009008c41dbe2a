//! Connection lifecycle listeners for feed-link.
//!
//! A [`ConnectionHandle`](crate::ConnectionHandle) fans every event out to
//! any number of independently registered listeners:
//!
//! - `on_open`: fired after the socket opened and the outbound queue flushed
//! - `on_message`: fired for every parsed inbound message
//! - `on_close`: fired when the socket closes (intentionally or not)
//! - `on_error`: fired on connection, probe or protocol errors
//!
//! Each registration returns a [`ListenerHandle`]. Dropping the handle
//! unregisters the listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use feed_link::ConnectionManager;
//!
//! # fn example(manager: &ConnectionManager) {
//! let _opened = manager.on_open(|| println!("Connected!"));
//! let _closed = manager.on_close(|reason| println!("Disconnected: {}", reason));
//! let _errors = manager.on_error(|err| eprintln!("Error (recoverable={}): {}", err.recoverable, err));
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::models::InboundMessage;

/// Reason for a close event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// WebSocket close code, if available (e.g. 1000 = normal, 1006 = abnormal).
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to `on_error` listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// Whether this error is recoverable (i.e. auto-reconnect may succeed).
    pub recoverable: bool,
}

impl ConnectionError {
    /// Create a new connection error.
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Type alias for on_open callbacks.
pub type OnOpenCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for on_message callbacks.
pub type OnMessageCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Type alias for on_close callbacks.
pub type OnCloseCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Type alias for on_error callbacks.
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Open,
    Message,
    Close,
    Error,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    open: Vec<(u64, OnOpenCallback)>,
    message: Vec<(u64, OnMessageCallback)>,
    close: Vec<(u64, OnCloseCallback)>,
    error: Vec<(u64, OnErrorCallback)>,
}

impl Registry {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, kind: ListenerKind, id: u64) {
        match kind {
            ListenerKind::Open => self.open.retain(|(i, _)| *i != id),
            ListenerKind::Message => self.message.retain(|(i, _)| *i != id),
            ListenerKind::Close => self.close.retain(|(i, _)| *i != id),
            ListenerKind::Error => self.error.retain(|(i, _)| *i != id),
        }
    }
}

/// Multi-subscriber listener registry shared by a connection and its handles.
///
/// Emission snapshots the registered callbacks and invokes them with the
/// lock released, so a callback may register or drop listeners itself.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Mutex<Registry>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        f.debug_struct("Listeners")
            .field("on_open", &registry.open.len())
            .field("on_message", &registry.message.len())
            .field("on_close", &registry.close.len())
            .field("on_error", &registry.error.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self, kind: ListenerKind, id: u64) -> ListenerHandle {
        ListenerHandle {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Register a callback invoked after every successful open.
    pub fn on_open(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.open.push((id, Arc::new(f)));
            id
        };
        self.handle(ListenerKind::Open, id)
    }

    /// Register a callback invoked for every parsed inbound message.
    pub fn on_message(
        &self,
        f: impl Fn(&InboundMessage) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.message.push((id, Arc::new(f)));
            id
        };
        self.handle(ListenerKind::Message, id)
    }

    /// Register a callback invoked when the socket closes.
    pub fn on_close(
        &self,
        f: impl Fn(DisconnectReason) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.close.push((id, Arc::new(f)));
            id
        };
        self.handle(ListenerKind::Close, id)
    }

    /// Register a callback invoked when a connection error occurs.
    pub fn on_error(
        &self,
        f: impl Fn(ConnectionError) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate();
            registry.error.push((id, Arc::new(f)));
            id
        };
        self.handle(ListenerKind::Error, id)
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        let registry = self.lock();
        registry.open.len() + registry.message.len() + registry.close.len() + registry.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_open(&self) {
        let callbacks: Vec<_> = self.lock().open.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            cb();
        }
    }

    pub(crate) fn emit_message(&self, message: &InboundMessage) {
        let callbacks: Vec<_> = self.lock().message.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            cb(message);
        }
    }

    pub(crate) fn emit_close(&self, reason: DisconnectReason) {
        let callbacks: Vec<_> = self.lock().close.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            cb(reason.clone());
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        let callbacks: Vec<_> = self.lock().error.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            cb(error.clone());
        }
    }
}

/// Registration guard returned by every `on_*` call.
///
/// The listener stays registered for as long as this value lives. Use
/// [`detach`](ListenerHandle::detach) to keep it registered for the lifetime
/// of the connection instead.
#[must_use = "dropping a ListenerHandle unregisters the listener immediately"]
pub struct ListenerHandle {
    registry: Weak<Mutex<Registry>>,
    kind: ListenerKind,
    id: u64,
}

impl ListenerHandle {
    /// Keep the listener registered until the connection itself is dropped.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }

    /// Unregister now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InboundMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_multiple_listeners_all_fire() {
        let listeners = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        let _a = listeners.on_open(move || {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        let _b = listeners.on_open(move || {
            c2.fetch_add(10, Ordering::SeqCst);
        });

        listeners.emit_open();
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_dropping_handle_unregisters() {
        let listeners = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let handle = listeners.on_close(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        listeners.emit_close(DisconnectReason::new("first"));
        drop(handle);
        listeners.emit_close(DisconnectReason::new("second"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_detach_keeps_listener() {
        let listeners = Listeners::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        listeners
            .on_error(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .detach();

        listeners.emit_error(ConnectionError::new("boom", true));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let listeners = Listeners::new();
        let inner = listeners.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();

        let _h = listeners.on_message(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
            inner.on_open(|| {}).detach();
        });

        let msg = InboundMessage::parse(r#"{"channel":"twitter","success":true}"#).unwrap();
        listeners.emit_message(&msg);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::new("bye").to_string(), "bye");
        assert_eq!(
            DisconnectReason::with_code("restart", 1012).to_string(),
            "restart (code: 1012)"
        );
    }
}
