//! AIS Stream WebSocket Transport
//!
//! Implements `TransportFactory` / `StreamTransport` over
//! tokio-tungstenite. The connection manager owns reconnects and
//! subscription; this adapter only moves frames.
//!
//! - Text frames are surfaced as-is, binary frames as lossy UTF-8
//! - Ping / pong are answered by tungstenite and never surfaced
//! - A close frame ends the stream (`None`)

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument};

use crate::ports::stream_transport::{StreamTransport, TransportFactory};

/// Upper bound for the TCP + TLS + upgrade handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens WebSocket connections to the position feed.
pub struct AisStreamConnector {
    url: String,
}

impl AisStreamConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl TransportFactory for AisStreamConnector {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&self) -> Result<Box<dyn StreamTransport>> {
        let (ws, response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str()))
            .await
            .context("AIS stream handshake timed out")?
            .context("AIS stream connection failed")?;

        info!(status = %response.status(), "AIS stream WebSocket connected");
        Ok(Box::new(WsTransport { ws }))
    }
}

/// One open WebSocket session.
struct WsTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.ws
            .send(Message::Text(text))
            .await
            .context("Failed to send text frame")
    }

    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "AIS stream closed by server");
                    return None;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(anyhow!("AIS stream read error: {e}"))),
            }
        }
    }
}
