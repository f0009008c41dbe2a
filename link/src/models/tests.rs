use serde_json::json;

use super::*;

// ==================== ConnectionOptions Tests ====================

#[test]
fn test_connection_options_default() {
    let opts = ConnectionOptions::default();

    assert!(opts.auto_reconnect, "auto_reconnect should default to true");
    assert_eq!(opts.reconnect_delay_ms, 1000);
    assert_eq!(opts.max_reconnect_delay_ms, 30000);
    assert_eq!(opts.max_reconnect_attempts, Some(10));
    assert_eq!(opts.backoff, BackoffStrategy::Linear);
    assert_eq!(opts.keepalive, KeepalivePayload::Ping);
    assert!(opts.health_check_url.is_none());
}

#[test]
fn test_connection_options_builder_pattern() {
    let opts = ConnectionOptions::new()
        .with_auto_reconnect(false)
        .with_reconnect_delay_ms(250)
        .with_max_reconnect_delay_ms(5000)
        .with_max_reconnect_attempts(None)
        .with_backoff(BackoffStrategy::Exponential)
        .with_keepalive(KeepalivePayload::Text(r#"{"channel":"ping"}"#.into()))
        .with_health_check_url("http://localhost:3000/health");

    assert!(!opts.auto_reconnect);
    assert_eq!(opts.reconnect_delay_ms, 250);
    assert_eq!(opts.max_reconnect_delay_ms, 5000);
    assert!(opts.max_reconnect_attempts.is_none());
    assert_eq!(opts.backoff, BackoffStrategy::Exponential);
    assert_eq!(opts.health_check_url.as_deref(), Some("http://localhost:3000/health"));
}

#[test]
fn test_connection_options_missing_fields_use_defaults() {
    let opts: ConnectionOptions = serde_json::from_value(json!({ "reconnect_delay_ms": 50 })).unwrap();
    assert_eq!(opts.reconnect_delay_ms, 50);
    assert!(opts.auto_reconnect);
    assert_eq!(opts.max_reconnect_attempts, Some(10));
    assert_eq!(opts.keepalive, KeepalivePayload::Ping);
}

#[test]
fn test_keepalive_payload_wire_shape() {
    let text = serde_json::to_value(KeepalivePayload::Text("hi".into())).unwrap();
    assert_eq!(text, json!({ "kind": "text", "payload": "hi" }));

    let disabled: KeepalivePayload = serde_json::from_value(json!({ "kind": "disabled" })).unwrap();
    assert_eq!(disabled, KeepalivePayload::Disabled);
}

// ==================== SubscriptionMessage Tests ====================

#[test]
fn test_subscribe_message_wire_shape() {
    let msg = SubscriptionMessage::keyed(
        "twitter",
        Action::Subscribe,
        "license-key",
        PayloadKind::Usernames,
        vec!["alice".to_string()],
    );

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({
            "channel": "twitter",
            "action": "subscribe",
            "credential": "license-key",
            "usernames": ["alice"]
        })
    );
}

#[test]
fn test_groups_payload_uses_groups_field() {
    let msg = SubscriptionMessage::keyed(
        "discord",
        Action::Subscribe,
        "tok",
        PayloadKind::Groups,
        vec!["g1".to_string(), "g2".to_string()],
    );

    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["groups"], json!(["g1", "g2"]));
    assert!(value.get("usernames").is_none());
}

#[test]
fn test_unkeyed_join_has_no_payload_field() {
    let msg = SubscriptionMessage::new("transactions", Action::Join, "tok");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({ "channel": "transactions", "action": "join", "credential": "tok" })
    );
    assert!(msg.keys().is_empty());
    assert_eq!(msg.payload_kind(), None);
}

#[test]
fn test_counterpart_overrides_only_action() {
    let join = SubscriptionMessage::keyed(
        "truth",
        Action::Join,
        "tok",
        PayloadKind::Usernames,
        vec!["bob".to_string()],
    );
    let leave = join.counterpart();

    assert_eq!(leave.action, Action::Leave);
    assert_eq!(leave.channel, join.channel);
    assert_eq!(leave.credential, join.credential);
    assert_eq!(leave.payload, join.payload);

    assert_eq!(Action::Subscribe.counterpart(), Action::Unsubscribe);
    assert!(Action::Join.is_acquire());
    assert!(!Action::Leave.is_acquire());
}

// ==================== InboundMessage Tests ====================

#[test]
fn test_parse_channel_message() {
    let msg = InboundMessage::parse(
        r#"{"channel":"twitter","success":true,"data":{"text":"gm"},"rooms":["twitter"]}"#,
    )
    .unwrap();

    match &msg {
        InboundMessage::Channel(ch) => {
            assert_eq!(ch.channel, "twitter");
            assert!(ch.success);
            assert_eq!(ch.data, Some(json!({ "text": "gm" })));
        },
        other => panic!("expected channel message, got {:?}", other),
    }
    assert_eq!(msg.channel(), Some("twitter"));
    assert!(msg.ping_rooms().is_none());
}

#[test]
fn test_parse_ping_ack() {
    let msg = InboundMessage::parse(r#"{"channel":"ping","success":true,"rooms":["a","b"]}"#).unwrap();
    assert_eq!(msg.ping_rooms(), Some(&["a".to_string(), "b".to_string()][..]));

    let failed = InboundMessage::parse(r#"{"channel":"ping","success":false,"rooms":["a"]}"#).unwrap();
    assert!(failed.ping_rooms().is_none(), "unsuccessful ping is not an ack");
}

#[test]
fn test_parse_server_shutdown() {
    let msg = InboundMessage::parse(r#"{"event":"server_shutdown","code":1012}"#).unwrap();
    assert!(msg.is_server_shutdown());
    assert_eq!(msg.channel(), None);

    let other_code = InboundMessage::parse(r#"{"event":"server_shutdown","code":1000}"#).unwrap();
    assert!(!other_code.is_server_shutdown());
}

#[test]
fn test_parse_rejects_garbage() {
    let err = InboundMessage::parse("not json").unwrap_err();
    assert!(matches!(err, crate::error::FeedLinkError::ProtocolError(_)));

    let err = InboundMessage::parse(r#"{"unrelated":1}"#).unwrap_err();
    assert!(matches!(err, crate::error::FeedLinkError::ProtocolError(_)));
}

// ==================== ConnectionStatus Tests ====================

#[test]
fn test_connection_status_defaults_to_disconnected() {
    let status = ConnectionStatus::default();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.is_connected());
    assert!(!status.is_abandoned());
    assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
}
