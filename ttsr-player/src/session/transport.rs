//! Network transport to the synthesis source
//!
//! [`Transport`] opens connections; a [`Connection`] carries text frames out
//! and binary/text frames in. The WebSocket implementation is the production
//! transport; tests substitute scripted ones.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Transport-level failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("connection closed")]
    Closed,
}

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Closure {
    /// Normal close from the source; the stream is complete
    Finished,
    /// Error, abnormal close code, or the peer vanished
    Dropped(String),
}

/// One inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Binary(Vec<u8>),
    Text(String),
    Closed(Closure),
}

/// Connection factory
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;
}

/// An open connection
///
/// `recv` must be cancel-safe: the session abandons it inside `select!`.
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound event; returns `Inbound::Closed` once the connection ends
    async fn recv(&mut self) -> Inbound;

    async fn close(&mut self);
}

/// WebSocket transport (tokio-tungstenite)
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        debug!("Connecting to {}", self.url);
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("Connected to {} (HTTP {})", self.url, response.status());
        Ok(Box::new(WebSocketConnection {
            stream,
            closed: false,
        }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Inbound {
        if self.closed {
            return Inbound::Closed(Closure::Dropped("connection already closed".to_string()));
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Inbound::Binary(data),
                Some(Ok(Message::Text(text))) => return Inbound::Text(text),
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    return Inbound::Closed(classify_close(frame));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Inbound::Closed(Closure::Dropped(e.to_string()));
                }
                None => {
                    self.closed = true;
                    return Inbound::Closed(Closure::Dropped("stream ended".to_string()));
                }
            }
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.stream.close(None).await;
        }
    }
}

fn classify_close(frame: Option<CloseFrame<'_>>) -> Closure {
    match frame {
        None => Closure::Finished,
        Some(frame) if frame.code == CloseCode::Normal => Closure::Finished,
        Some(frame) => Closure::Dropped(format!("close code {}: {}", u16::from(frame.code), frame.reason)),
    }
}
