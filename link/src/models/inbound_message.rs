use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Channel name the server uses for keepalive acknowledgements.
pub const PING_CHANNEL: &str = "ping";

/// Server event name that requests every client to reconnect.
pub const SERVER_SHUTDOWN_EVENT: &str = "server_shutdown";

/// Close code ("service restart") that accompanies [`SERVER_SHUTDOWN_EVENT`].
pub const SERVICE_RESTART_CODE: u16 = 1012;

/// Server-to-client message.
///
/// Two shapes exist on the wire: channel traffic
/// (`{"channel":…, "success":…, "data":…, "rooms":[…]}`) and out-of-band
/// server events (`{"event":"server_shutdown","code":1012}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    /// Out-of-band server event.
    Event(ServerEvent),
    /// Payload or acknowledgement addressed to a channel.
    Channel(ChannelMessage),
}

/// Message addressed to a channel (or the `ping` pseudo-channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
}

/// Out-of-band server event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            crate::error::FeedLinkError::ProtocolError(format!(
                "Failed to parse inbound message: {}",
                e
            ))
        })
    }

    /// The channel this message is addressed to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            InboundMessage::Channel(msg) => Some(msg.channel.as_str()),
            InboundMessage::Event(_) => None,
        }
    }

    /// `true` for the server's forced-reconnect signal.
    pub fn is_server_shutdown(&self) -> bool {
        matches!(
            self,
            InboundMessage::Event(ServerEvent { event, code: Some(SERVICE_RESTART_CODE) })
                if event == SERVER_SHUTDOWN_EVENT
        )
    }

    /// Rooms listed by a successful ping acknowledgement, `None` otherwise.
    pub fn ping_rooms(&self) -> Option<&[String]> {
        match self {
            InboundMessage::Channel(ChannelMessage {
                channel,
                success: true,
                rooms,
                ..
            }) if channel == PING_CHANNEL => Some(rooms.as_deref().unwrap_or(&[])),
            _ => None,
        }
    }
}
