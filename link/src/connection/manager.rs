//! One resilient connection per endpoint, driven by a background task.
//!
//! [`ConnectionManager`] owns the task; [`ConnectionHandle`] is the cloneable
//! command surface that bindings and feeds hold. Every socket mutation
//! happens inside the task:
//!
//! - at most one socket at a time; `connect()` while connecting or connected
//!   is a no-op
//! - outbound text is queued while the socket is not open and flushed once,
//!   in order, right after the next open
//! - heartbeat ticks close stale sockets; unexpected closes go through the
//!   reconnect policy and the optional health probe
//! - `disconnect()` is terminal until the next explicit `connect()`

use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;

use crate::{
    connection::{now_ms, FAR_FUTURE, SOCKET_CLOSE_TIMEOUT},
    error::{FeedLinkError, Result},
    event_handlers::{ConnectionError, DisconnectReason, ListenerHandle, Listeners},
    health::{HealthProbe, HttpHealthProbe},
    heartbeat::{HeartbeatAction, HeartbeatMonitor},
    models::{
        ConnectionOptions, ConnectionState, ConnectionStatus, InboundMessage, KeepalivePayload,
        SubscriptionMessage,
    },
    network::NetworkMonitor,
    reconnect::ReconnectPolicy,
    timeouts::FeedLinkTimeouts,
    transport::{resolve_ws_url, CloseFrame, Connector, Frame, Socket, WebSocketConnector},
};

enum ConnCmd {
    Connect,
    Send(String),
    Disconnect,
    Reconnect(String),
    Shutdown,
}

/// Cloneable command surface of a [`ConnectionManager`].
///
/// All methods are non-blocking: they enqueue a command for the background
/// task and return. Methods fail only with
/// [`FeedLinkError::ConnectionClosed`] once the manager has been dropped.
#[derive(Clone)]
pub struct ConnectionHandle {
    url: Arc<str>,
    cmd_tx: mpsc::UnboundedSender<ConnCmd>,
    status_rx: watch::Receiver<ConnectionStatus>,
    listeners: Listeners,
    timeouts: FeedLinkTimeouts,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("url", &self.url)
            .field("state", &self.status_rx.borrow().state)
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl ConnectionHandle {
    fn dispatch(&self, cmd: ConnCmd) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| {
            FeedLinkError::ConnectionClosed(format!("connection task for {} has stopped", self.url))
        })
    }

    /// Resolved `ws://` / `wss://` endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the socket unless one is already connecting or connected.
    ///
    /// Also the only way out of a manual disconnect or an abandoned state.
    pub fn connect(&self) -> Result<()> {
        self.dispatch(ConnCmd::Connect)
    }

    /// Serialize and send a subscription control message.
    pub fn send(&self, message: &SubscriptionMessage) -> Result<()> {
        let text = message.to_json()?;
        self.send_text(text)
    }

    /// Send a raw text frame.
    ///
    /// Written immediately when connected; otherwise queued and, unless the
    /// connection was manually stopped or abandoned, a connect is started.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.dispatch(ConnCmd::Send(text.into()))
    }

    /// Close the socket, cancel every timer and drop queued messages.
    ///
    /// No automatic reconnect happens until [`connect`](Self::connect).
    pub fn disconnect(&self) -> Result<()> {
        self.dispatch(ConnCmd::Disconnect)
    }

    /// Close the current socket and let the reconnect policy take over.
    ///
    /// Ignored unless connected, so concurrent callers trigger one close.
    pub fn reconnect(&self, reason: impl Into<String>) -> Result<()> {
        self.dispatch(ConnCmd::Reconnect(reason.into()))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().is_connected()
    }

    /// Receive every status transition.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// `true` once the background task has exited.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub fn timeouts(&self) -> &FeedLinkTimeouts {
        &self.timeouts
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Called after every successful open, once the queue was flushed.
    pub fn on_open(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        self.listeners.on_open(f)
    }

    /// Called for every parsed inbound message.
    pub fn on_message(
        &self,
        f: impl Fn(&InboundMessage) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.listeners.on_message(f)
    }

    /// Called whenever an open socket closes.
    pub fn on_close(
        &self,
        f: impl Fn(DisconnectReason) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.listeners.on_close(f)
    }

    /// Called on connect failures, probe failures and abandonment.
    pub fn on_error(
        &self,
        f: impl Fn(ConnectionError) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.listeners.on_error(f)
    }
}

/// Owner of one connection task.
///
/// Dereferences to [`ConnectionHandle`]. Dropping the manager shuts the task
/// down and closes the socket; outstanding handles then fail with
/// [`FeedLinkError::ConnectionClosed`].
///
/// # Examples
///
/// ```rust,no_run
/// use feed_link::{Action, ConnectionManager, PayloadKind, SubscriptionMessage};
///
/// # async fn example() -> feed_link::Result<()> {
/// let manager = ConnectionManager::builder("wss://feed.example.com/ws").build()?;
///
/// let _opened = manager.on_open(|| println!("connected"));
/// manager.send(&SubscriptionMessage::keyed(
///     "twitter",
///     Action::Subscribe,
///     "license-key",
///     PayloadKind::Usernames,
///     vec!["alice".to_string()],
/// ))?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    handle: ConnectionHandle,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn builder(url: impl Into<String>) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new(url.into())
    }

    /// A cloneable handle to inject into bindings and feeds.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Close the socket and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.handle.cmd_tx.send(ConnCmd::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Deref for ConnectionManager {
    type Target = ConnectionHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager").field("handle", &self.handle).finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.handle.cmd_tx.send(ConnCmd::Shutdown);
    }
}

/// Builder for [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    url: String,
    options: ConnectionOptions,
    timeouts: FeedLinkTimeouts,
    connector: Option<Arc<dyn Connector>>,
    health_probe: Option<Arc<dyn HealthProbe>>,
    network: NetworkMonitor,
    auto_connect: bool,
}

impl ConnectionManagerBuilder {
    fn new(url: String) -> Self {
        Self {
            url,
            options: ConnectionOptions::default(),
            timeouts: FeedLinkTimeouts::default(),
            connector: None,
            health_probe: None,
            network: NetworkMonitor::default(),
            auto_connect: false,
        }
    }

    /// Reconnect, keepalive and health-check behavior.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeouts(mut self, timeouts: FeedLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the WebSocket transport.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Gate every reconnect attempt on this probe.
    ///
    /// Takes precedence over `ConnectionOptions::health_check_url`.
    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.health_probe = Some(probe);
        self
    }

    /// Host network signal consulted by the heartbeat.
    pub fn network(mut self, network: NetworkMonitor) -> Self {
        self.network = network;
        self
    }

    /// Start connecting as soon as the task is spawned.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Spawn the connection task. Must be called within a Tokio runtime.
    pub fn build(self) -> Result<ConnectionManager> {
        let url = resolve_ws_url(&self.url)?;

        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(WebSocketConnector::new(&self.timeouts)),
        };

        let health_probe = match (self.health_probe, self.options.health_check_url.as_deref()) {
            (Some(probe), _) => Some(probe),
            (None, Some(probe_url)) => Some(Arc::new(HttpHealthProbe::new(
                probe_url,
                self.timeouts.health_probe_timeout,
            )?) as Arc<dyn HealthProbe>),
            (None, None) => None,
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let listeners = Listeners::new();

        let task = ConnectionTask {
            url: url.clone(),
            connector,
            health_probe,
            network: self.network,
            policy: ReconnectPolicy::new(&self.options, url.clone()),
            heartbeat: HeartbeatMonitor::new(
                self.timeouts.stale_connection_timeout,
                self.options.keepalive != KeepalivePayload::Disabled,
                TokioInstant::now(),
            ),
            options: self.options,
            timeouts: self.timeouts.clone(),
            listeners: listeners.clone(),
            status_tx,
            cmd_rx,
            queue: VecDeque::new(),
            status: ConnectionStatus::default(),
            manual_stop: false,
        };

        if self.auto_connect {
            let _ = cmd_tx.send(ConnCmd::Connect);
        }

        let join = tokio::spawn(task.run());

        Ok(ConnectionManager {
            handle: ConnectionHandle {
                url: Arc::from(url),
                cmd_tx,
                status_rx,
                listeners,
                timeouts: self.timeouts,
            },
            task: Some(join),
        })
    }
}

// ── Background connection task ──────────────────────────────────────────────

async fn close_socket(socket: &mut Box<dyn Socket>, frame: CloseFrame) {
    match tokio::time::timeout(SOCKET_CLOSE_TIMEOUT, socket.close(Some(frame))).await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => log::debug!("[feed-link] Close handshake failed: {}", e),
        Err(_) => log::debug!("[feed-link] Close handshake timed out"),
    }
}

enum Phase {
    Idle,
    Connecting,
    Open(Box<dyn Socket>),
    Backoff(Duration),
    Probing(Duration),
    Abandoned,
}

/// Outcome of a command received while waiting out a delay.
enum Waiting {
    Stay,
    Go(Phase),
    Exit,
}

struct ConnectionTask {
    url: String,
    connector: Arc<dyn Connector>,
    health_probe: Option<Arc<dyn HealthProbe>>,
    network: NetworkMonitor,
    options: ConnectionOptions,
    timeouts: FeedLinkTimeouts,
    listeners: Listeners,
    status_tx: watch::Sender<ConnectionStatus>,
    cmd_rx: mpsc::UnboundedReceiver<ConnCmd>,
    queue: VecDeque<String>,
    policy: ReconnectPolicy,
    heartbeat: HeartbeatMonitor,
    status: ConnectionStatus,
    manual_stop: bool,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle => self.idle(false).await,
                Phase::Abandoned => self.idle(true).await,
                Phase::Connecting => self.connecting().await,
                Phase::Open(socket) => self.open(socket).await,
                Phase::Backoff(delay) => self.backoff(delay).await,
                Phase::Probing(delay) => self.probing(delay).await,
            };
            match next {
                Some(next) => phase = next,
                None => break,
            }
        }
        log::debug!("[feed-link] Connection task for {} exited", self.url);
    }

    fn publish(&mut self) {
        self.status.queued_messages = self.queue.len();
        self.status.retry_count = self.policy.attempts();
        self.status_tx.send_replace(self.status.clone());
    }

    /// Timestamp-only update: visible to readers, does not wake watchers.
    fn record_activity(&mut self) {
        let at = Some(now_ms());
        self.status.last_message_at_ms = at;
        self.status_tx.send_if_modified(|status| {
            status.last_message_at_ms = at;
            false
        });
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.status.state = state;
        self.publish();
    }

    fn enqueue(&mut self, text: String) {
        self.queue.push_back(text);
        self.publish();
    }

    fn stop_requested(&mut self) {
        if !self.queue.is_empty() {
            log::debug!(
                "[feed-link] Discarding {} queued message(s) on disconnect",
                self.queue.len()
            );
        }
        self.queue.clear();
        self.manual_stop = true;
        self.status.last_close_reason = Some("Client disconnected".to_string());
        self.set_state(ConnectionState::Disconnected);
    }

    // ── Idle / Abandoned ────────────────────────────────────────────────────

    async fn idle(&mut self, abandoned: bool) -> Option<Phase> {
        loop {
            match self.cmd_rx.recv().await {
                Some(ConnCmd::Connect) => {
                    self.manual_stop = false;
                    self.policy.reset();
                    return Some(Phase::Connecting);
                },
                Some(ConnCmd::Send(text)) => {
                    self.enqueue(text);
                    if !self.manual_stop && !abandoned {
                        return Some(Phase::Connecting);
                    }
                },
                Some(ConnCmd::Disconnect) => {
                    self.stop_requested();
                    if abandoned {
                        return Some(Phase::Idle);
                    }
                },
                Some(ConnCmd::Reconnect(_)) => {},
                Some(ConnCmd::Shutdown) | None => return None,
            }
        }
    }

    // ── Connecting ──────────────────────────────────────────────────────────

    async fn connecting(&mut self) -> Option<Phase> {
        log::info!(
            "[feed-link] Connecting to {} (attempt {})",
            self.url,
            self.policy.attempts() + 1
        );
        self.set_state(ConnectionState::Connecting);

        let connector = self.connector.clone();
        let url = self.url.clone();
        let timeout = self.timeouts.connection_timeout;
        let attempt = async move {
            if FeedLinkTimeouts::is_no_timeout(timeout) {
                return connector.connect(&url).await;
            }
            match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(FeedLinkError::TimeoutError(format!(
                    "Connection timeout ({:?})",
                    timeout
                ))),
            }
        };
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Connect) | Some(ConnCmd::Reconnect(_)) => {},
                    Some(ConnCmd::Send(text)) => self.enqueue(text),
                    Some(ConnCmd::Disconnect) => {
                        self.stop_requested();
                        return Some(Phase::Idle);
                    },
                    Some(ConnCmd::Shutdown) | None => return None,
                },

                result = &mut attempt => {
                    return Some(match result {
                        Ok(socket) => self.opened(socket).await,
                        Err(e) => self.connect_failed(e),
                    });
                }
            }
        }
    }

    async fn opened(&mut self, mut socket: Box<dyn Socket>) -> Phase {
        log::info!("[feed-link] Connected to {}", self.url);
        self.policy.reset();
        self.heartbeat.reset(TokioInstant::now());
        self.status.last_close_reason = None;
        self.status.state = ConnectionState::Connected;

        // Snapshot-then-clear: sends arriving during the flush wait in the
        // command channel and are written after it.
        let pending: Vec<String> = self.queue.drain(..).collect();
        self.publish();
        if !pending.is_empty() {
            log::debug!("[feed-link] Flushing {} queued message(s)", pending.len());
        }

        let mut pending = pending.into_iter();
        while let Some(text) = pending.next() {
            if let Err(e) = socket.send(Frame::Text(text.clone())).await {
                let mut requeued: VecDeque<String> = std::iter::once(text).chain(pending).collect();
                requeued.append(&mut self.queue);
                self.queue = requeued;
                log::warn!("[feed-link] Flushing queued messages failed: {}", e);
                self.listeners.emit_error(ConnectionError::new(e.to_string(), true));
                // on_open never fired for this socket, so no on_close either.
                self.status.last_close_reason = Some(format!("Send failed: {}", e));
                self.set_state(ConnectionState::Disconnected);
                return self.schedule_retry();
            }
        }

        self.listeners.emit_open();
        Phase::Open(socket)
    }

    fn connect_failed(&mut self, error: FeedLinkError) -> Phase {
        log::warn!("[feed-link] Connection attempt to {} failed: {}", self.url, error);
        self.listeners
            .emit_error(ConnectionError::new(error.to_string(), error.is_transient()));
        self.status.last_close_reason = Some(error.to_string());
        self.schedule_retry()
    }

    // ── Open ────────────────────────────────────────────────────────────────

    fn keepalive_frame(&self) -> Option<Frame> {
        match &self.options.keepalive {
            KeepalivePayload::Disabled => None,
            KeepalivePayload::Ping => Some(Frame::Ping(Bytes::new())),
            KeepalivePayload::Text(text) => Some(Frame::Text(text.clone())),
        }
    }

    async fn open(&mut self, mut socket: Box<dyn Socket>) -> Option<Phase> {
        let period = self.timeouts.heartbeat_interval;
        let has_heartbeat = !period.is_zero();
        let mut next_tick = TokioInstant::now() + if has_heartbeat { period } else { FAR_FUTURE };

        loop {
            let tick = tokio::time::sleep_until(next_tick);
            tokio::pin!(tick);

            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Connect) => {
                        log::debug!("[feed-link] connect() ignored; already connected");
                    },
                    Some(ConnCmd::Send(text)) => {
                        if let Err(e) = socket.send(Frame::Text(text.clone())).await {
                            self.queue.push_front(text);
                            self.listeners.emit_error(ConnectionError::new(e.to_string(), true));
                            return Some(self.connection_lost(DisconnectReason::new(format!(
                                "Send failed: {}",
                                e
                            ))));
                        }
                    },
                    Some(ConnCmd::Reconnect(reason)) => {
                        log::info!("[feed-link] Forcing reconnect of {}: {}", self.url, reason);
                        self.set_state(ConnectionState::Closing);
                        close_socket(&mut socket, CloseFrame::normal(reason.clone())).await;
                        return Some(self.connection_lost(DisconnectReason::new(reason)));
                    },
                    Some(ConnCmd::Disconnect) => {
                        log::info!("[feed-link] Disconnecting from {}", self.url);
                        self.set_state(ConnectionState::Closing);
                        close_socket(&mut socket, CloseFrame::normal("Client disconnected")).await;
                        self.stop_requested();
                        self.listeners
                            .emit_close(DisconnectReason::with_code("Client disconnected", 1000));
                        return Some(Phase::Idle);
                    },
                    Some(ConnCmd::Shutdown) | None => {
                        self.set_state(ConnectionState::Closing);
                        close_socket(&mut socket, CloseFrame::normal("Client shutdown")).await;
                        self.set_state(ConnectionState::Disconnected);
                        self.listeners
                            .emit_close(DisconnectReason::with_code("Client disconnected", 1000));
                        return None;
                    },
                },

                _ = &mut tick, if has_heartbeat => {
                    let now = TokioInstant::now();
                    next_tick = now + period;
                    match self.heartbeat.tick(now, self.network.is_online()) {
                        HeartbeatAction::Skip => {
                            log::debug!("[feed-link] Host network offline; skipping heartbeat");
                        },
                        HeartbeatAction::ForceClose => {
                            let elapsed = self.heartbeat.elapsed(now);
                            log::warn!(
                                "[feed-link] No message from {} for {:?}; closing stale connection",
                                self.url,
                                elapsed
                            );
                            self.set_state(ConnectionState::Closing);
                            close_socket(&mut socket, CloseFrame::new(4000, "Stale connection")).await;
                            return Some(self.connection_lost(DisconnectReason::new(format!(
                                "Stale connection: no message for {:?}",
                                elapsed
                            ))));
                        },
                        HeartbeatAction::Keepalive => {
                            if let Some(frame) = self.keepalive_frame() {
                                if let Err(e) = socket.send(frame).await {
                                    log::warn!("[feed-link] Keepalive failed: {}", e);
                                    return Some(self.connection_lost(DisconnectReason::new(format!(
                                        "Keepalive failed: {}",
                                        e
                                    ))));
                                }
                            }
                        },
                        HeartbeatAction::Idle => {},
                    }
                }

                frame = socket.next_frame() => {
                    self.heartbeat.record_message(TokioInstant::now());
                    self.record_activity();

                    match frame {
                        Some(Ok(Frame::Text(text))) => match InboundMessage::parse(&text) {
                            Ok(message) => self.listeners.emit_message(&message),
                            Err(e) => log::warn!("[feed-link] Dropping message: {}", e),
                        },
                        Some(Ok(Frame::Ping(payload))) => {
                            if let Err(e) = socket.send(Frame::Pong(payload)).await {
                                log::debug!("[feed-link] Pong failed: {}", e);
                            }
                        },
                        Some(Ok(Frame::Pong(_))) => {
                            log::debug!("[feed-link] Keepalive: received Pong");
                        },
                        Some(Ok(Frame::Close(frame))) => {
                            let reason = match frame {
                                Some(f) => DisconnectReason::with_code(f.reason, f.code),
                                None => DisconnectReason::new("Server closed connection"),
                            };
                            return Some(self.connection_lost(reason));
                        },
                        Some(Err(e)) => {
                            self.listeners.emit_error(ConnectionError::new(e.to_string(), true));
                            return Some(self.connection_lost(DisconnectReason::new(format!(
                                "WebSocket error: {}",
                                e
                            ))));
                        },
                        None => {
                            return Some(self.connection_lost(DisconnectReason::new(
                                "WebSocket stream ended",
                            )));
                        },
                    }
                }
            }
        }
    }

    // ── Close / retry ───────────────────────────────────────────────────────

    fn connection_lost(&mut self, reason: DisconnectReason) -> Phase {
        log::info!("[feed-link] Connection to {} closed: {}", self.url, reason);
        self.status.last_close_reason = Some(reason.to_string());
        self.set_state(ConnectionState::Disconnected);
        self.listeners.emit_close(reason);
        self.schedule_retry()
    }

    fn schedule_retry(&mut self) -> Phase {
        if self.manual_stop {
            self.set_state(ConnectionState::Disconnected);
            return Phase::Idle;
        }

        if !self.options.auto_reconnect {
            log::info!("[feed-link] Auto-reconnect disabled; staying disconnected");
            self.set_state(ConnectionState::Disconnected);
            return Phase::Idle;
        }

        match self.policy.next_delay() {
            Some(delay) => {
                log::info!(
                    "[feed-link] Attempting reconnection in {}ms (attempt {})",
                    delay.as_millis(),
                    self.policy.attempts()
                );
                self.set_state(ConnectionState::Reconnecting);
                Phase::Backoff(delay)
            },
            None => {
                let max = self.policy.max_attempts().unwrap_or_default();
                log::warn!(
                    "[feed-link] Max reconnection attempts ({}) reached; abandoning {}",
                    max,
                    self.url
                );
                self.set_state(ConnectionState::Abandoned);
                self.listeners.emit_error(ConnectionError::new(
                    format!("Max reconnection attempts ({}) reached", max),
                    false,
                ));
                Phase::Abandoned
            },
        }
    }

    fn waiting_cmd(&mut self, cmd: Option<ConnCmd>) -> Waiting {
        match cmd {
            Some(ConnCmd::Connect) => {
                log::debug!("[feed-link] connect() during backoff; connecting now");
                Waiting::Go(Phase::Connecting)
            },
            Some(ConnCmd::Send(text)) => {
                self.enqueue(text);
                Waiting::Stay
            },
            Some(ConnCmd::Reconnect(_)) => Waiting::Stay,
            Some(ConnCmd::Disconnect) => {
                self.stop_requested();
                Waiting::Go(Phase::Idle)
            },
            Some(ConnCmd::Shutdown) | None => Waiting::Exit,
        }
    }

    async fn backoff(&mut self, delay: Duration) -> Option<Phase> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match self.waiting_cmd(cmd) {
                    Waiting::Stay => {},
                    Waiting::Go(phase) => return Some(phase),
                    Waiting::Exit => return None,
                },

                _ = &mut sleep => {
                    return Some(if self.health_probe.is_some() {
                        Phase::Probing(delay)
                    } else {
                        Phase::Connecting
                    });
                }
            }
        }
    }

    async fn probing(&mut self, delay: Duration) -> Option<Phase> {
        let Some(probe) = self.health_probe.clone() else {
            return Some(Phase::Connecting);
        };

        let timeout = self.timeouts.health_probe_timeout;
        let check = async move {
            if FeedLinkTimeouts::is_no_timeout(timeout) {
                probe.check().await
            } else {
                tokio::time::timeout(timeout, probe.check()).await.unwrap_or(false)
            }
        };
        tokio::pin!(check);

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match self.waiting_cmd(cmd) {
                    Waiting::Stay => {},
                    Waiting::Go(phase) => return Some(phase),
                    Waiting::Exit => return None,
                },

                healthy = &mut check => {
                    if healthy {
                        return Some(Phase::Connecting);
                    }
                    log::info!(
                        "[feed-link] Health probe failed; probing again in {}ms",
                        delay.as_millis()
                    );
                    self.listeners
                        .emit_error(ConnectionError::new("Health probe failed", true));
                    return Some(Phase::Backoff(delay));
                }
            }
        }
    }
}
