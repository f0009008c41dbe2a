//! Transport seam between the connection task and the wire.
//!
//! The connection task only ever sees a [`Connector`] producing boxed
//! [`Socket`]s. [`websocket::WebSocketConnector`] is the production
//! implementation; tests plug in an in-memory pair.

pub mod websocket;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use websocket::{resolve_ws_url, WebSocketConnector};

/// Close code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// 1000, normal closure.
    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(1000, reason)
    }
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseFrame>),
}

/// Opens sockets to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>>;
}

/// An open, full-duplex socket.
#[async_trait]
pub trait Socket: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Next inbound frame; `None` once the stream ended.
    ///
    /// Must be cancel-safe: the connection task polls it inside `select!`.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Send a close frame and release the socket.
    async fn close(&mut self, frame: Option<CloseFrame>) -> Result<()>;
}
