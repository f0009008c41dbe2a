//! tokio-tungstenite implementation of the transport seam.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        error::Error as WsError,
        protocol::{frame::coding::CloseCode, CloseFrame as WsCloseFrame, Message},
    },
    MaybeTlsStream,
};

use super::{CloseFrame, Connector, Frame, Socket};
use crate::connection::MAX_WS_TEXT_MESSAGE_BYTES;
use crate::error::{FeedLinkError, Result};
use crate::timeouts::FeedLinkTimeouts;

type WebSocketStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Normalize an endpoint into a `ws://` or `wss://` URL.
///
/// `http(s)` maps to `ws(s)`. Path and query are kept; fragments and
/// embedded credentials are rejected.
pub fn resolve_ws_url(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url.trim()).map_err(|e| {
        FeedLinkError::ConfigurationError(format!("Invalid WebSocket URL '{}': {}", url, e))
    })?;

    validate_ws_url(&parsed)?;

    let ws_scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(FeedLinkError::ConfigurationError(format!(
                "Unsupported URL scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };

    parsed.set_scheme(ws_scheme).map_err(|_| {
        FeedLinkError::ConfigurationError("Failed to set WebSocket URL scheme".to_string())
    })?;

    Ok(parsed.to_string())
}

fn validate_ws_url(url: &Url) -> Result<()> {
    if url.host_str().is_none() {
        return Err(FeedLinkError::ConfigurationError(
            "WebSocket URL must include a host".to_string(),
        ));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(FeedLinkError::ConfigurationError(
            "WebSocket URL must not include username/password credentials".to_string(),
        ));
    }

    if url.fragment().is_some() {
        return Err(FeedLinkError::ConfigurationError(
            "WebSocket URL must not include a fragment".to_string(),
        ));
    }

    Ok(())
}

/// Production connector over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connection_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(timeouts: &FeedLinkTimeouts) -> Self {
        Self {
            connection_timeout: timeouts.connection_timeout,
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(&FeedLinkTimeouts::default())
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>> {
        log::debug!("[feed-link] Establishing WebSocket connection to {}", url);

        let request = url.into_client_request().map_err(|e| {
            FeedLinkError::WebSocketError(format!("Failed to build WebSocket request: {}", e))
        })?;

        let connect_result = if !FeedLinkTimeouts::is_no_timeout(self.connection_timeout) {
            tokio::time::timeout(self.connection_timeout, connect_async(request)).await
        } else {
            Ok(connect_async(request).await)
        };

        let stream = match connect_result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(WsError::Http(response))) => {
                let status = response.status();
                let body_text = response
                    .into_body()
                    .as_ref()
                    .and_then(|b| {
                        if b.is_empty() {
                            None
                        } else {
                            Some(String::from_utf8_lossy(b).into_owned())
                        }
                    })
                    .unwrap_or_default();
                let message = match status.as_u16() {
                    401 => "Unauthorized: WebSocket requires valid credentials".to_string(),
                    403 => "Forbidden: Access to WebSocket denied".to_string(),
                    code => {
                        if body_text.is_empty() {
                            format!("WebSocket HTTP error: {}", code)
                        } else {
                            format!("WebSocket HTTP error {}: {}", code, body_text)
                        }
                    },
                };
                return Err(FeedLinkError::WebSocketError(message));
            },
            Ok(Err(e)) => {
                return Err(FeedLinkError::WebSocketError(format!("Connection failed: {}", e)));
            },
            Err(_) => {
                return Err(FeedLinkError::TimeoutError(format!(
                    "Connection timeout ({:?})",
                    self.connection_timeout
                )));
            },
        };

        log::info!("[feed-link] WebSocket connected to {}", url);
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream,
}

#[async_trait]
impl Socket for TungsteniteSocket {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close(close) => Message::Close(close.map(to_ws_close)),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| FeedLinkError::WebSocketError(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(FeedLinkError::WebSocketError(e.to_string()))),
            };

            let frame = match message {
                Message::Text(text) => {
                    if text.len() > MAX_WS_TEXT_MESSAGE_BYTES {
                        log::warn!("[feed-link] Text message too large ({} bytes)", text.len());
                        continue;
                    }
                    Frame::Text(text.as_str().to_owned())
                },
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Frame::Text(text),
                    Err(_) => {
                        log::warn!("[feed-link] Dropping non-UTF-8 binary frame ({} bytes)", data.len());
                        continue;
                    },
                },
                Message::Ping(payload) => Frame::Ping(payload),
                Message::Pong(payload) => Frame::Pong(payload),
                Message::Close(close) => Frame::Close(close.map(|f| CloseFrame {
                    code: f.code.into(),
                    reason: f.reason.as_str().to_owned(),
                })),
                Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self, frame: Option<CloseFrame>) -> Result<()> {
        self.stream
            .close(frame.map(to_ws_close))
            .await
            .map_err(|e| FeedLinkError::WebSocketError(e.to_string()))
    }
}

fn to_ws_close(frame: CloseFrame) -> WsCloseFrame {
    WsCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.into(),
    }
}
