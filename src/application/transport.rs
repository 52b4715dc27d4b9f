// Transport trait for the real-time event source
use crate::domain::events::{InboundEvent, OutboundCommand};
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("transport I/O error: {0}")]
    Io(String),

    #[error("malformed frame: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum TransportEvent {
    Message(InboundEvent),
    /// Peer or network closed the connection
    Closed(Option<String>),
    /// Connection broke with an error
    Failed(TransportError),
}

/// One live connection: commands go out on `outbound`, events arrive on
/// `inbound`. Dropping `outbound` closes the connection.
pub struct TransportLink {
    pub outbound: mpsc::Sender<OutboundCommand>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection to the event source
    async fn open(&self) -> Result<TransportLink, TransportError>;
}
