use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{Jid, Message, TransportEvent};

/// Failures talking to the messaging network.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport connection closed")]
    Closed,

    #[error("transport request timed out")]
    Timeout,

    #[error("transport rejected the request: {0}")]
    Remote(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] sonic_rs::Error),
}

/// The connection to the external messaging network.
///
/// Connection state and pairing codes are reported through the event
/// channel handed to `connect`; the wrapper that owns the transport keeps
/// the resulting state.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens the connection and starts pushing events into `events`.
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Result<(), TransportError>;

    async fn disconnect(&self);

    async fn send_message(&self, chat: &Jid, message: Message) -> Result<(), TransportError>;

    /// Current participants of a group conversation.
    async fn group_roster(&self, chat: &Jid) -> Result<Vec<Jid>, TransportError>;
}
