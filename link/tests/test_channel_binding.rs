//! Channel bindings on a shared connection: routing, rejoin after reconnect,
//! staleness and teardown.
//!
//! ```bash
//! cd link && cargo test --test test_channel_binding
//! ```

use async_trait::async_trait;
use feed_link::{
    Action, ArcCredentialProvider, ChannelBinding, ConnectionManager, ConnectionState,
    CredentialProvider, FeedLinkTimeouts, Frame, PayloadKind, SubscriptionMessage,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

mod common;

use common::{fake_transport, keyed, test_manager, test_options, wait_for_state, TEST_URL};

// ── shared helpers ────────────────────────────────────────────────────────────

fn join(channel: &str) -> SubscriptionMessage {
    SubscriptionMessage::new(channel, Action::Join, "license-key")
}

fn join_json(channel: &str) -> serde_json::Value {
    json!({"channel": channel, "action": "join", "credential": "license-key"})
}

struct CountingLicense {
    calls: AtomicU32,
}

#[async_trait]
impl CredentialProvider for CountingLicense {
    async fn credential(&self) -> feed_link::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{}", n))
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_join_sent_once_and_replayed_after_reconnect() {
    let (connector, mut servers) = fake_transport();
    let manager = test_manager(connector.clone());

    let binding = ChannelBinding::builder(manager.handle())
        .channel("news")
        .initial(join("news"))
        .bind();

    let mut first = servers.next().await;
    assert_eq!(first.recv_json().await, join_json("news"));
    first.expect_silence(Duration::from_secs(1)).await;

    first.hang_up();
    let mut second = servers.next().await;
    assert_eq!(second.recv_json().await, join_json("news"));
    second.expect_silence(Duration::from_secs(1)).await;

    binding.unbind();
    assert_eq!(
        second.recv_json().await,
        json!({"channel": "news", "action": "leave", "credential": "license-key"})
    );
    second.expect_silence(Duration::from_secs(1)).await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unbind_releases_every_live_subscription() {
    let (connector, mut servers) = fake_transport();
    let manager = test_manager(connector);

    let binding = ChannelBinding::builder(manager.handle())
        .channels(["news", "twitter"])
        .initial(join("news"))
        .bind();

    let mut server = servers.next().await;
    assert_eq!(server.recv_json().await, join_json("news"));
    wait_for_state(&manager, ConnectionState::Connected).await;

    binding
        .send(&SubscriptionMessage::keyed(
            "twitter",
            Action::Subscribe,
            "license-key",
            PayloadKind::Usernames,
            vec!["alice".into(), "bob".into()],
        ))
        .unwrap();
    assert_eq!(
        server.recv_json().await,
        keyed("twitter", "subscribe", "usernames", &["alice", "bob"])
    );
    assert_eq!(binding.live_subscriptions().len(), 2);

    binding.unbind();
    assert_eq!(
        server.recv_json().await,
        keyed("twitter", "unsubscribe", "usernames", &["alice", "bob"])
    );
    assert_eq!(
        server.recv_json().await,
        json!({"channel": "news", "action": "leave", "credential": "license-key"})
    );
    server.expect_silence(Duration::from_secs(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_routes_only_own_channels_and_filters_ping_acks() {
    let (connector, mut servers) = fake_transport();
    let manager = test_manager(connector);

    let mut news = ChannelBinding::builder(manager.handle())
        .channel("news")
        .initial(join("news"))
        .bind();
    let mut sports = ChannelBinding::builder(manager.handle())
        .channel("sports")
        .bind();

    let mut server = servers.next().await;
    assert_eq!(server.recv_json().await, join_json("news"));

    server.send_json(json!({"channel": "ping", "success": true, "rooms": ["news"]}));
    server.send_json(json!({"channel": "news", "success": true, "data": {"headline": "hi"}}));
    server.send_json(json!({"channel": "sports", "success": true, "data": 7}));

    let message = news.next().await.unwrap();
    assert_eq!(message.channel, "news");
    assert_eq!(message.data, Some(json!({"headline": "hi"})));
    assert!(news.last_ping_at_ms().is_some());
    assert!(news.last_message_at_ms().is_some());

    let message = sports.next().await.unwrap();
    assert_eq!(message.data, Some(json!(7)));
    assert!(sports.last_ping_at_ms().is_none());

    sleep(Duration::from_millis(50)).await;
    assert!(news.try_next().is_none());
    assert!(sports.try_next().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_server_shutdown_forces_single_reconnect() {
    let (connector, mut servers) = fake_transport();
    let manager = ConnectionManager::builder(TEST_URL)
        .connector(connector.clone())
        .options(test_options().with_reconnect_delay_ms(500))
        .timeouts(common::test_timeouts())
        .build()
        .unwrap();

    let _news = ChannelBinding::builder(manager.handle())
        .channel("news")
        .initial(join("news"))
        .bind();
    let _sports = ChannelBinding::builder(manager.handle())
        .channel("sports")
        .initial(join("sports"))
        .bind();

    let mut first = servers.next().await;
    let mut joined = vec![first.recv_json().await, first.recv_json().await];
    joined.sort_by_key(|v| v["channel"].as_str().unwrap_or_default().to_string());
    assert_eq!(joined, vec![join_json("news"), join_json("sports")]);

    first.send_json(json!({"event": "server_shutdown", "code": 1012}));
    match first.recv().await {
        Some(Frame::Close(Some(frame))) => assert_eq!(frame.reason, "Server shutdown (1012)"),
        other => panic!("expected a close frame, got {:?}", other),
    }

    let mut second = servers.next().await;
    let mut rejoined = vec![second.recv_json().await, second.recv_json().await];
    rejoined.sort_by_key(|v| v["channel"].as_str().unwrap_or_default().to_string());
    assert_eq!(rejoined, vec![join_json("news"), join_json("sports")]);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(connector.attempts(), 2);
    assert!(servers.try_next().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_silent_channel_is_rejoined_once_per_period() {
    let (connector, mut servers) = fake_transport();
    let timeouts = FeedLinkTimeouts::builder()
        .heartbeat_interval(Duration::from_secs(1))
        .stale_connection_timeout(Duration::from_secs(60))
        .channel_stale_timeout(Duration::from_secs(1))
        .channel_check_interval(Duration::from_millis(100))
        .build();
    let manager = ConnectionManager::builder(TEST_URL)
        .connector(connector.clone())
        .options(test_options())
        .timeouts(timeouts)
        .build()
        .unwrap();

    let mut binding = ChannelBinding::builder(manager.handle())
        .channel("news")
        .initial(join("news"))
        .bind();

    let mut server = servers.next().await;
    assert_eq!(server.recv_json().await, join_json("news"));
    assert!(!binding.is_stale());

    // Nothing on "news" for more than a second: one rejoin, then quiet
    // until the next full period.
    assert_eq!(server.recv_json().await, join_json("news"));
    assert!(binding.is_stale());
    server.expect_silence(Duration::from_millis(900)).await;
    assert_eq!(server.recv_json().await, join_json("news"));

    server.send_json(json!({"channel": "news", "success": true, "data": 1}));
    binding.next().await.unwrap();
    assert!(!binding.is_stale());

    // The connection itself never went down.
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_refreshes_credential() {
    let (connector, mut servers) = fake_transport();
    let manager = test_manager(connector);

    let provider = Arc::new(CountingLicense {
        calls: AtomicU32::new(0),
    }) as ArcCredentialProvider;
    let _binding = ChannelBinding::builder(manager.handle())
        .channel("news")
        .initial(SubscriptionMessage::new("news", Action::Join, "stale-token"))
        .credential(provider)
        .bind();

    let mut first = servers.next().await;
    assert_eq!(first.recv_json().await["credential"], "token-1");

    first.hang_up();
    let mut second = servers.next().await;
    assert_eq!(second.recv_json().await["credential"], "token-2");
}

#[tokio::test(start_paused = true)]
async fn test_binding_without_initial_messages_does_not_connect() {
    let (connector, mut servers) = fake_transport();
    let manager = test_manager(connector.clone());

    let binding = ChannelBinding::builder(manager.handle())
        .channel("news")
        .bind();
    sleep(Duration::from_secs(5)).await;

    assert_eq!(connector.attempts(), 0);
    assert!(servers.try_next().is_none());
    binding.unbind();
}
