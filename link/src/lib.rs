//! # feed-link: resilient real-time subscription client
//!
//! Keeps logical monitor feeds alive over one shared WebSocket per endpoint.
//!
//! ## Features
//!
//! - **Single connection**: one socket per endpoint, shared by every binding
//! - **Outbound queue**: messages sent while disconnected flush in order on open
//! - **Heartbeat**: silent sockets are closed and reconnected
//! - **Backoff**: capped-linear (or exponential) retries with an attempt cap
//!   and an optional health probe gate
//! - **Interest sync**: minimal subscribe/unsubscribe diffs, full resend after
//!   a reconnect, leave messages on teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use feed_link::{ConnectionManager, InterestSet, MonitorFeed, PayloadKind};
//!
//! #[tokio::main]
//! async fn main() -> feed_link::Result<()> {
//!     let manager = ConnectionManager::builder("wss://feed.example.com/ws").build()?;
//!     let _status = manager.on_close(|reason| eprintln!("closed: {}", reason));
//!
//!     let interest = InterestSet::from_keys(["alice", "bob"]);
//!     let mut feed = MonitorFeed::builder(manager.handle(), interest.clone())
//!         .shape("twitter", PayloadKind::Usernames)
//!         .credential("license-key")
//!         .start();
//!
//!     while let Some(message) = feed.next().await {
//!         println!("{}: {:?}", message.channel, message.data);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod channel;
pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod health;
pub mod heartbeat;
pub mod models;
pub mod network;
pub mod reconnect;
pub mod subscription;
pub mod timeouts;
pub mod transport;

// Re-export main types for convenience
pub use auth::{ArcCredentialProvider, CredentialProvider, ResolvedCredential};
pub use channel::{BindingSender, ChannelBinding, ChannelBindingBuilder, SubscriptionLedger};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionManagerBuilder};
pub use error::{FeedLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, ListenerHandle, Listeners};
pub use health::{HealthProbe, HttpHealthProbe};
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use models::{
    Action, BackoffStrategy, ChannelMessage, ConnectionOptions, ConnectionState,
    ConnectionStatus, InboundMessage, KeepalivePayload, PayloadKind, ServerEvent,
    SubscriptionMessage, SubscriptionPayload,
};
pub use network::NetworkMonitor;
pub use reconnect::ReconnectPolicy;
pub use subscription::{
    ChannelShape, InterestDelta, InterestSet, MonitorFeed, MonitorFeedBuilder, SubscriptionDiffer,
};
pub use timeouts::{FeedLinkTimeouts, FeedLinkTimeoutsBuilder};
pub use transport::{CloseFrame, Connector, Frame, Socket, WebSocketConnector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
