//! WebSocket-backed `DuplexConnection` and its opener.
//!
//! Keepalive lives here: server pings are answered with pongs below the
//! frame protocol, so the engines above only ever see complete data
//! frames and the close signal.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ledgerrpc_core::error::TransportError;
use ledgerrpc_core::transport::{ChannelEvent, ChannelOpener, DuplexConnection, Endpoint};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one WebSocket connection per subscription.
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    /// `base_url` is the `ws://` / `wss://` root of the service.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// The connector's base URL (for diagnostics).
    pub fn url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChannelOpener for WsConnector {
    async fn open(&self, endpoint: Endpoint) -> Result<Box<dyn DuplexConnection>, TransportError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        tracing::debug!(url = %url, "opening duplex channel");

        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;

        Ok(Box::new(WsConnection {
            ws,
            closed: false,
            close_reason: None,
        }))
    }
}

/// One live WebSocket connection.
pub struct WsConnection {
    ws: WsStream,
    closed: bool,
    close_reason: Option<String>,
}

#[async_trait]
impl DuplexConnection for WsConnection {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed {
                reason: self.close_reason.clone(),
            });
        }
        self.ws
            .send(Message::Binary(frame))
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))
    }

    async fn next_event(&mut self) -> ChannelEvent {
        if self.closed {
            return ChannelEvent::Closed {
                reason: self.close_reason.clone(),
            };
        }
        loop {
            match self.ws.next().await {
                None => {
                    self.closed = true;
                    return ChannelEvent::Closed { reason: None };
                }
                Some(Err(e)) => {
                    self.closed = true;
                    self.close_reason = Some(e.to_string());
                    return ChannelEvent::Closed {
                        reason: self.close_reason.clone(),
                    };
                }
                Some(Ok(Message::Binary(bytes))) => return ChannelEvent::Message(bytes),
                Some(Ok(Message::Text(text))) => {
                    return ChannelEvent::Message(text.into_bytes())
                }
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    self.close_reason = frame.map(|f| f.reason.to_string());
                    return ChannelEvent::Closed {
                        reason: self.close_reason.clone(),
                    };
                }
                Some(Ok(Message::Ping(payload))) => {
                    // Keepalive handled here, invisible to the protocol.
                    let _ = self.ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(_)) => {} // pong / raw frame — ignore
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "close handshake failed");
            return Ok(());
        }
        // Drain until the peer acknowledges so the close is complete
        // when this resolves.
        while let Some(Ok(msg)) = self.ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
        Ok(())
    }
}
