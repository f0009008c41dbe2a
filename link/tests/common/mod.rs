//! In-memory transport shared by the integration tests.
//!
//! [`FakeConnector`] hands every accepted connection to the test as a
//! [`FakeServer`], which sees the frames the client writes and can push
//! frames back or drop the connection.

#![allow(dead_code)]

use async_trait::async_trait;
use feed_link::{
    BackoffStrategy, CloseFrame, ConnectionHandle, ConnectionManager, ConnectionOptions,
    ConnectionState, Connector, FeedLinkError, FeedLinkTimeouts, Frame, KeepalivePayload, Socket,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

pub const TEST_URL: &str = "ws://feed.test/ws";

/// How long a test waits for something that must happen.
pub const WAIT: Duration = Duration::from_secs(30);

pub struct FakeConnector {
    servers_tx: mpsc::UnboundedSender<FakeServer>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    broken_sends: AtomicBool,
    attempt_times: Mutex<Vec<Instant>>,
}

impl FakeConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Refuse every connect until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sockets accepted while set reject every client write.
    pub fn set_broken_sends(&self, broken: bool) {
        self.broken_sends.store(broken, Ordering::SeqCst);
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _url: &str) -> feed_link::Result<Box<dyn Socket>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());

        if self.failing.load(Ordering::SeqCst) {
            return Err(FeedLinkError::WebSocketError("Connection refused".to_string()));
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
        let _ = self.servers_tx.send(FakeServer {
            rx: from_client_rx,
            tx: to_client_tx,
        });
        Ok(Box::new(FakeSocket {
            tx: from_client_tx,
            rx: to_client_rx,
            broken: self.broken_sends.load(Ordering::SeqCst),
        }))
    }
}

struct FakeSocket {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
    broken: bool,
}

#[async_trait]
impl Socket for FakeSocket {
    async fn send(&mut self, frame: Frame) -> feed_link::Result<()> {
        if self.broken {
            return Err(FeedLinkError::WebSocketError("Broken pipe".to_string()));
        }
        self.tx
            .send(frame)
            .map_err(|_| FeedLinkError::WebSocketError("Connection reset by peer".to_string()))
    }

    async fn next_frame(&mut self) -> Option<feed_link::Result<Frame>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self, frame: Option<CloseFrame>) -> feed_link::Result<()> {
        let _ = self.tx.send(Frame::Close(frame));
        self.rx.close();
        Ok(())
    }
}

/// Server side of one accepted connection.
pub struct FakeServer {
    rx: mpsc::UnboundedReceiver<Frame>,
    tx: mpsc::UnboundedSender<Frame>,
}

impl FakeServer {
    /// Next frame from the client; `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        timeout(WAIT, self.rx.recv()).await.expect("timed out waiting for a client frame")
    }

    /// Next text frame, skipping keepalive pings.
    pub async fn recv_text(&mut self) -> String {
        loop {
            match self.recv().await {
                Some(Frame::Text(text)) => return text,
                Some(Frame::Ping(_)) | Some(Frame::Pong(_)) => continue,
                other => panic!("expected a text frame, got {:?}", other),
            }
        }
    }

    pub async fn recv_json(&mut self) -> Value {
        let text = self.recv_text().await;
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    /// Assert the client writes no text frame within `within`.
    pub async fn expect_silence(&mut self, within: Duration) {
        let deadline = Instant::now() + within;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return,
                Ok(Some(Frame::Ping(_))) | Ok(Some(Frame::Pong(_))) => continue,
                Ok(other) => panic!("expected silence, got {:?}", other),
            }
        }
    }

    /// Wait until the client closes this connection.
    pub async fn expect_closed(&mut self) {
        loop {
            match self.recv().await {
                Some(Frame::Close(_)) | None => return,
                Some(_) => continue,
            }
        }
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.tx.send(Frame::Text(text.to_string()));
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    pub fn send_frame(&self, frame: Frame) {
        let _ = self.tx.send(frame);
    }

    /// Simulate a dropped TCP connection (no close frame).
    pub fn hang_up(self) {}
}

/// Accepted connections, in order.
pub struct Servers {
    rx: mpsc::UnboundedReceiver<FakeServer>,
}

impl Servers {
    pub async fn next(&mut self) -> FakeServer {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    pub fn try_next(&mut self) -> Option<FakeServer> {
        self.rx.try_recv().ok()
    }
}

pub fn fake_transport() -> (Arc<FakeConnector>, Servers) {
    let (servers_tx, rx) = mpsc::unbounded_channel();
    let connector = Arc::new(FakeConnector {
        servers_tx,
        attempts: AtomicUsize::new(0),
        failing: AtomicBool::new(false),
        broken_sends: AtomicBool::new(false),
        attempt_times: Mutex::new(Vec::new()),
    });
    (connector, Servers { rx })
}

/// Heartbeat every second, stale after 30s, no channel staleness.
pub fn test_timeouts() -> FeedLinkTimeouts {
    FeedLinkTimeouts::builder()
        .connection_timeout(Duration::from_secs(5))
        .heartbeat_interval(Duration::from_secs(1))
        .stale_connection_timeout(Duration::from_secs(30))
        .channel_stale_timeout(Duration::ZERO)
        .build()
}

/// Linear 100ms backoff, unlimited attempts, no keepalive frames.
pub fn test_options() -> ConnectionOptions {
    ConnectionOptions::default()
        .with_reconnect_delay_ms(100)
        .with_max_reconnect_delay_ms(10_000)
        .with_max_reconnect_attempts(None)
        .with_backoff(BackoffStrategy::Linear)
        .with_keepalive(KeepalivePayload::Disabled)
}

pub fn test_manager(connector: Arc<FakeConnector>) -> ConnectionManager {
    ConnectionManager::builder(TEST_URL)
        .connector(connector)
        .options(test_options())
        .timeouts(test_timeouts())
        .build()
        .expect("valid test manager")
}

pub async fn wait_for_state(handle: &ConnectionHandle, state: ConnectionState) {
    let mut rx = handle.watch_status();
    timeout(WAIT, rx.wait_for(|status| status.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", state))
        .expect("connection task stopped");
}

/// Shorthand for the wire shape of a keyed message.
pub fn keyed(channel: &str, action: &str, field: &str, keys: &[&str]) -> Value {
    serde_json::json!({
        "channel": channel,
        "action": action,
        "credential": "license-key",
        field: keys,
    })
}
