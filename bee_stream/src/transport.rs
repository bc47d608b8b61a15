use crate::messages::ServerMessage;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Connection already closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Frame(Bytes),
    /// A text message; frames are expected as binary only.
    Text(String),
}

/// The client side of a session. `recv` returns `None` once the peer has
/// disconnected.
#[async_trait]
pub trait Transport: Send {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>>;

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
impl Transport for WebSocket {
    async fn recv(&mut self) -> Option<Result<Inbound, TransportError>> {
        loop {
            let message = match WebSocket::recv(self).await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::from(e))),
            };

            match message {
                Message::Binary(data) => return Some(Ok(Inbound::Frame(data))),
                Message::Text(text) => {
                    return Some(Ok(Inbound::Text(text.as_str().to_string())));
                }
                Message::Close(frame) => {
                    tracing::debug!("Client sent close frame: {:?}", frame);
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), TransportError> {
        let text = message.to_json()?;
        WebSocket::send(self, Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        WebSocket::send(self, Message::Close(None)).await?;
        Ok(())
    }
}
