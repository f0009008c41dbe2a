//! A self-healing monitor feed: interest set → differ → binding.
//!
//! The feed task wakes on every interest-set change and pushes the minimal
//! delta through its [`ChannelBinding`]. While the connection is down the
//! delta is only recorded; the binding replays the full live set on the next
//! open. An empty set disconnects the shared connection, and the first key
//! to appear afterwards connects it again. An update whose credential cannot
//! be resolved is retried on a linearly growing delay.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    auth::ResolvedCredential,
    channel::{BindingSender, ChannelBinding},
    connection::ConnectionHandle,
    models::{BackoffStrategy, ChannelMessage, ConnectionOptions, PayloadKind, SubscriptionMessage},
    reconnect::ReconnectPolicy,
    subscription::{differ::ChannelShape, InterestSet, SubscriptionDiffer},
};

/// First retry after the credential could not be resolved; grows linearly.
const CREDENTIAL_RETRY_DELAY_MS: u64 = 1_000;
const CREDENTIAL_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Builder for [`MonitorFeed`].
pub struct MonitorFeedBuilder {
    handle: ConnectionHandle,
    interest: InterestSet,
    shapes: Vec<ChannelShape>,
    credential: ResolvedCredential,
}

impl MonitorFeedBuilder {
    /// Channel to keep in sync, with the payload field its keys use.
    pub fn shape(mut self, channel: impl Into<String>, kind: PayloadKind) -> Self {
        self.shapes.push(ChannelShape::new(channel, kind));
        self
    }

    /// Credential embedded in every outbound message; resolved once per cycle.
    pub fn credential(mut self, credential: impl Into<ResolvedCredential>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Bind the channels and start following the interest set.
    /// Must be called within a Tokio runtime.
    pub fn start(self) -> MonitorFeed {
        let binding = ChannelBinding::builder(self.handle.clone())
            .channels(self.shapes.iter().map(|s| s.channel.clone()))
            .credential(self.credential.clone())
            .bind();

        let task = tokio::spawn(feed_task(
            binding.sender(),
            self.handle,
            self.interest.subscribe(),
            self.shapes,
            self.credential,
        ));

        MonitorFeed {
            interest: self.interest,
            binding,
            task,
        }
    }
}

/// A feed that keeps the server-side subscription set equal to an
/// [`InterestSet`].
///
/// # Examples
///
/// ```rust,no_run
/// use feed_link::{ConnectionManager, InterestSet, MonitorFeed, PayloadKind};
///
/// # async fn example() -> feed_link::Result<()> {
/// let manager = ConnectionManager::builder("wss://feed.example.com/ws").build()?;
/// let interest = InterestSet::from_keys(["alice", "bob"]);
///
/// let mut feed = MonitorFeed::builder(manager.handle(), interest.clone())
///     .shape("twitter", PayloadKind::Usernames)
///     .credential("license-key")
///     .start();
///
/// interest.insert("carol");
/// while let Some(message) = feed.next().await {
///     println!("{}: {:?}", message.channel, message.data);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MonitorFeed {
    interest: InterestSet,
    binding: ChannelBinding,
    task: JoinHandle<()>,
}

impl MonitorFeed {
    pub fn builder(handle: ConnectionHandle, interest: InterestSet) -> MonitorFeedBuilder {
        MonitorFeedBuilder {
            handle,
            interest,
            shapes: Vec::new(),
            credential: ResolvedCredential::default(),
        }
    }

    pub fn interest(&self) -> &InterestSet {
        &self.interest
    }

    pub fn binding(&self) -> &ChannelBinding {
        &self.binding
    }

    /// Next payload message on one of the feed's channels.
    pub async fn next(&mut self) -> Option<ChannelMessage> {
        self.binding.next().await
    }

    /// Stop following the interest set and release every live subscription.
    pub fn unbind(self) {
        self.task.abort();
        // ChannelBinding's Drop performs the release.
    }
}

impl Drop for MonitorFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn feed_task(
    sender: BindingSender,
    handle: ConnectionHandle,
    mut interest_rx: watch::Receiver<BTreeSet<String>>,
    shapes: Vec<ChannelShape>,
    credential: ResolvedCredential,
) {
    let mut differ = SubscriptionDiffer::new();
    // Nothing requested yet: the first non-empty snapshot connects.
    let mut suspended = true;
    let mut credential_retry = ReconnectPolicy::new(
        &ConnectionOptions::default()
            .with_reconnect_delay_ms(CREDENTIAL_RETRY_DELAY_MS)
            .with_max_reconnect_delay_ms(CREDENTIAL_RETRY_MAX_DELAY_MS)
            .with_max_reconnect_attempts(None)
            .with_backoff(BackoffStrategy::Linear),
        "credential",
    );

    loop {
        let current = interest_rx.borrow_and_update().clone();
        let mut retry_in: Option<Duration> = None;

        if !differ.is_current(&current) {
            match credential.resolve().await {
                Ok(credential) => {
                    credential_retry.reset();
                    let delta = differ.apply(&current);
                    log::debug!(
                        "[feed-link] Interest update: +{} -{} ({} live)",
                        delta.added.len(),
                        delta.removed.len(),
                        current.len()
                    );
                    for message in delta.messages(&shapes, &credential) {
                        send(&sender, &message);
                    }
                },
                Err(e) => {
                    retry_in = credential_retry.next_delay();
                    log::warn!(
                        "[feed-link] Credential unavailable, update deferred {}ms: {}",
                        retry_in.unwrap_or_default().as_millis(),
                        e
                    );
                },
            }
        }

        if differ.tracked().is_empty() {
            if !suspended {
                log::info!("[feed-link] Interest set empty; disconnecting until a key appears");
                if let Err(e) = handle.disconnect() {
                    log::debug!("[feed-link] Disconnect dropped: {}", e);
                }
                suspended = true;
            }
        } else if suspended {
            if let Err(e) = handle.connect() {
                log::debug!("[feed-link] Connect dropped: {}", e);
            }
            suspended = false;
        }

        match retry_in {
            Some(delay) => {
                tokio::select! {
                    changed = interest_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    },
                    _ = tokio::time::sleep(delay) => {},
                }
            },
            None => {
                if interest_rx.changed().await.is_err() {
                    return;
                }
            },
        }
    }
}

fn send(sender: &BindingSender, message: &SubscriptionMessage) {
    if let Err(e) = sender.send(message) {
        log::warn!("[feed-link] {} on {} not sent: {}", message.action, message.channel, e);
    }
}
