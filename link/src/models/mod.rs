//! Data models for the feed-link client library.
//!
//! Defines the outbound subscription control messages, the inbound
//! channel/event messages and the connection-level options and status.

pub mod action;
pub mod connection_options;
pub mod connection_status;
pub mod inbound_message;
pub mod subscription_message;
pub mod subscription_payload;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use connection_options::{BackoffStrategy, ConnectionOptions, KeepalivePayload};
pub use connection_status::{ConnectionState, ConnectionStatus};
pub use inbound_message::{
    ChannelMessage, InboundMessage, ServerEvent, PING_CHANNEL, SERVER_SHUTDOWN_EVENT,
    SERVICE_RESTART_CODE,
};
pub use subscription_message::SubscriptionMessage;
pub use subscription_payload::{PayloadKind, SubscriptionPayload};
