use crate::error::{AppError, Result};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Opens duplex text connections to an endpoint
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Conn>> + Send;
}

/// One established duplex text connection
pub trait Connection: Send + 'static {
    /// Next inbound text frame. `None` once the peer has closed the connection.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String>>> + Send;

    fn send(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;
}

/// WebSocket transport over tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn connect(&self, url: &str) -> Result<WsConnection> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| AppError::WebSocket(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(WsConnection { stream })
    }
}

impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(msg_result) = self.stream.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => return Some(Err(AppError::WebSocket(e.to_string()))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(text)),
                Message::Close(frame) => {
                    debug!(?frame, "Server closed connection");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    // tungstenite answers pings itself
                }
                Message::Binary(bytes) => {
                    warn!(len = bytes.len(), "Ignoring unexpected binary frame");
                }
            }
        }
        None
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| AppError::WebSocket(e.to_string()))
    }
}
