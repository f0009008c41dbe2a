//! One consumer bound to one or more channels of a shared connection.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant as TokioInstant, MissedTickBehavior};

use crate::{
    auth::ResolvedCredential,
    channel::ledger::SubscriptionLedger,
    connection::{now_ms, ConnectionHandle, DEFAULT_EVENT_CHANNEL_CAPACITY, FAR_FUTURE},
    error::Result,
    event_handlers::ListenerHandle,
    models::{ChannelMessage, InboundMessage, SubscriptionMessage, SERVICE_RESTART_CODE},
};

struct BindingState {
    ledger: SubscriptionLedger,
    last_message_ms: Option<u64>,
    last_ping_ms: Option<u64>,
    /// Start of the current silence window.
    last_activity: TokioInstant,
    stale: bool,
}

struct BindingShared {
    names: Vec<String>,
    handle: ConnectionHandle,
    credential: Option<ResolvedCredential>,
    state: Mutex<BindingState>,
}

impl BindingShared {
    fn lock(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_ours(&self, channel: &str) -> bool {
        self.names.iter().any(|n| n == channel)
    }

    /// Filter applied to every inbound message of the connection.
    ///
    /// Returns the message to forward to the consumer, if any.
    fn route(&self, message: &InboundMessage) -> Option<ChannelMessage> {
        if message.is_server_shutdown() {
            log::info!(
                "[feed-link] Server shutdown ({}) received on {:?}; reconnecting",
                SERVICE_RESTART_CODE,
                self.names
            );
            if let Err(e) = self.handle.reconnect("Server shutdown (1012)") {
                log::debug!("[feed-link] Reconnect request dropped: {}", e);
            }
            return None;
        }

        if let Some(rooms) = message.ping_rooms() {
            if rooms.iter().any(|room| self.is_ours(room)) {
                let mut state = self.lock();
                state.last_ping_ms = Some(now_ms());
                state.last_activity = TokioInstant::now();
                state.stale = false;
            }
            return None;
        }

        match message {
            InboundMessage::Channel(msg) if self.is_ours(&msg.channel) => {
                let mut state = self.lock();
                state.last_message_ms = Some(now_ms());
                state.last_activity = TokioInstant::now();
                state.stale = false;
                Some(msg.clone())
            },
            _ => None,
        }
    }

    fn deliver(&self, message: &SubscriptionMessage) -> Result<()> {
        self.lock().ledger.record(message);
        if self.handle.is_connected() {
            self.handle.send(message)
        } else {
            Ok(())
        }
    }

    /// Replay the live ledger, refreshing the credential when a provider is set.
    async fn rejoin(&self, why: &str) {
        let mut messages = self.lock().ledger.replay();
        if messages.is_empty() {
            return;
        }

        if let Some(credential) = &self.credential {
            match credential.resolve().await {
                Ok(fresh) => {
                    for message in messages.iter_mut() {
                        message.credential = fresh.clone();
                    }
                },
                Err(e) => log::warn!("[feed-link] Credential refresh failed, reusing last: {}", e),
            }
        }

        log::info!(
            "[feed-link] Rejoining {:?} ({}): {} message(s)",
            self.names,
            why,
            messages.len()
        );
        for message in &messages {
            self.lock().ledger.record(message);
            if let Err(e) = self.handle.send(message) {
                log::warn!("[feed-link] Rejoin send failed: {}", e);
                return;
            }
        }
    }

    fn check_stale(&self, stale_after: std::time::Duration) -> bool {
        if !self.handle.is_connected() {
            return false;
        }
        let mut state = self.lock();
        let now = TokioInstant::now();
        if now.saturating_duration_since(state.last_activity) <= stale_after {
            return false;
        }
        state.stale = true;
        state.last_activity = now;
        true
    }
}

async fn binding_task(shared: Arc<BindingShared>, mut open_rx: mpsc::UnboundedReceiver<()>) {
    let timeouts = shared.handle.timeouts().clone();
    let stale_after = timeouts.channel_stale_timeout;
    let has_stale_check = !stale_after.is_zero() && !timeouts.channel_check_interval.is_zero();
    let period = if has_stale_check {
        timeouts.channel_check_interval
    } else {
        FAR_FUTURE
    };

    let mut checks = tokio::time::interval_at(TokioInstant::now() + period, period);
    checks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            opened = open_rx.recv() => {
                if opened.is_none() {
                    return;
                }
                shared.lock().last_activity = TokioInstant::now();
                shared.rejoin("connection opened").await;
            }

            _ = checks.tick(), if has_stale_check => {
                if shared.check_stale(stale_after) {
                    log::warn!(
                        "[feed-link] Channel {:?} silent for more than {:?}",
                        shared.names,
                        stale_after
                    );
                    shared.rejoin("channel stale").await;
                }
            }
        }
    }
}

/// Cloneable send-side of a [`ChannelBinding`].
///
/// Shares the binding's record, so messages sent here are released on unbind
/// and replayed on rejoin like those sent through the binding itself.
#[derive(Clone)]
pub struct BindingSender {
    shared: Arc<BindingShared>,
}

impl BindingSender {
    /// Record `message` and write it through when connected.
    pub fn send(&self, message: &SubscriptionMessage) -> Result<()> {
        self.shared.deliver(message)
    }

    pub fn is_connected(&self) -> bool {
        self.shared.handle.is_connected()
    }
}

/// Builder for [`ChannelBinding`].
pub struct ChannelBindingBuilder {
    handle: ConnectionHandle,
    names: Vec<String>,
    initial: Vec<SubscriptionMessage>,
    credential: Option<ResolvedCredential>,
}

impl ChannelBindingBuilder {
    /// Add a channel name to listen on.
    pub fn channel(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn channels<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Message sent on bind (typically a `join` or `subscribe`).
    pub fn initial(mut self, message: SubscriptionMessage) -> Self {
        self.initial.push(message);
        self
    }

    /// Refresh the credential of replayed messages from this source.
    pub fn credential(mut self, credential: impl Into<ResolvedCredential>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Register the filter, send the initial messages and start the
    /// staleness timer. Must be called within a Tokio runtime.
    pub fn bind(self) -> ChannelBinding {
        let (msg_tx, msg_rx) = mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let (open_tx, open_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(BindingShared {
            names: self.names,
            handle: self.handle.clone(),
            credential: self.credential,
            state: Mutex::new(BindingState {
                ledger: SubscriptionLedger::new(),
                last_message_ms: None,
                last_ping_ms: None,
                last_activity: TokioInstant::now(),
                stale: false,
            }),
        });

        let route_shared = shared.clone();
        let message_listener = self.handle.on_message(move |message| {
            if let Some(forward) = route_shared.route(message) {
                if let Err(e) = msg_tx.try_send(forward) {
                    log::warn!("[feed-link] Dropping message for {:?}: {}", route_shared.names, e);
                }
            }
        });
        let open_listener = self.handle.on_open(move || {
            let _ = open_tx.send(());
        });

        log::debug!("[feed-link] Binding {:?} on {}", shared.names, self.handle.url());

        for message in &self.initial {
            if let Err(e) = shared.deliver(message) {
                log::warn!("[feed-link] Initial message for {:?} not sent: {}", shared.names, e);
            }
        }
        if !self.initial.is_empty() && !self.handle.is_connected() {
            let _ = self.handle.connect();
        }

        let task = tokio::spawn(binding_task(shared.clone(), open_rx));

        ChannelBinding {
            shared,
            msg_rx,
            message_listener: Some(message_listener),
            open_listener: Some(open_listener),
            task: Some(task),
        }
    }
}

/// A consumer bound to one or more channel names on a shared connection.
///
/// While connected, [`send`](Self::send) writes through and records the
/// message; while disconnected it only records, and the whole live record is
/// replayed on the next open. Unbinding (or dropping) sends the
/// `leave`/`unsubscribe` counterpart of every live `join`/`subscribe`.
///
/// # Examples
///
/// ```rust,no_run
/// use feed_link::{Action, ChannelBinding, ConnectionManager, SubscriptionMessage};
///
/// # async fn example() -> feed_link::Result<()> {
/// let manager = ConnectionManager::builder("wss://feed.example.com/ws").build()?;
/// let mut binding = ChannelBinding::builder(manager.handle())
///     .channel("news")
///     .initial(SubscriptionMessage::new("news", Action::Join, "license-key"))
///     .bind();
///
/// while let Some(message) = binding.next().await {
///     println!("{:?}", message.data);
/// }
/// binding.unbind();
/// # Ok(())
/// # }
/// ```
pub struct ChannelBinding {
    shared: Arc<BindingShared>,
    msg_rx: mpsc::Receiver<ChannelMessage>,
    message_listener: Option<ListenerHandle>,
    open_listener: Option<ListenerHandle>,
    task: Option<JoinHandle<()>>,
}

impl ChannelBinding {
    pub fn builder(handle: ConnectionHandle) -> ChannelBindingBuilder {
        ChannelBindingBuilder {
            handle,
            names: Vec::new(),
            initial: Vec::new(),
            credential: None,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.shared.names
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.shared.handle
    }

    /// Record `message` and write it through when connected.
    pub fn send(&self, message: &SubscriptionMessage) -> Result<()> {
        self.shared.deliver(message)
    }

    pub fn sender(&self) -> BindingSender {
        BindingSender {
            shared: self.shared.clone(),
        }
    }

    /// Next message addressed to one of our channels.
    ///
    /// Returns `None` once the binding was released.
    pub async fn next(&mut self) -> Option<ChannelMessage> {
        self.msg_rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<ChannelMessage> {
        self.msg_rx.try_recv().ok()
    }

    pub fn is_stale(&self) -> bool {
        self.shared.lock().stale
    }

    pub fn last_message_at_ms(&self) -> Option<u64> {
        self.shared.lock().last_message_ms
    }

    pub fn last_ping_at_ms(&self) -> Option<u64> {
        self.shared.lock().last_ping_ms
    }

    /// Live join/subscribe messages, as they would be replayed.
    pub fn live_subscriptions(&self) -> Vec<SubscriptionMessage> {
        self.shared.lock().ledger.entries().to_vec()
    }

    /// Send every release counterpart, unregister the filter and stop the
    /// staleness timer.
    pub fn unbind(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();
        self.message_listener = None;
        self.open_listener = None;
        self.msg_rx.close();

        let releases = self.shared.lock().ledger.teardown();
        if releases.is_empty() {
            return;
        }
        if !self.shared.handle.is_connected() {
            log::debug!(
                "[feed-link] Unbinding {:?} while disconnected; nothing held server-side",
                self.shared.names
            );
            return;
        }

        log::info!(
            "[feed-link] Unbinding {:?}: sending {} release message(s)",
            self.shared.names,
            releases.len()
        );
        for message in &releases {
            if let Err(e) = self.shared.handle.send(message) {
                log::warn!("[feed-link] Release message not sent: {}", e);
                break;
            }
        }
    }
}

impl Drop for ChannelBinding {
    fn drop(&mut self) {
        self.release();
    }
}
