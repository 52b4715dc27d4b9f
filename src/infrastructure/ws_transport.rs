// WebSocket transport - JSON event envelopes over tokio-tungstenite
use crate::application::transport::{Transport, TransportError, TransportEvent, TransportLink};
use crate::domain::events::{InboundEvent, OutboundCommand};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const OUTBOUND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    token: Option<String>,
}

impl WebSocketTransport {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self { url, token }
    }

    fn connect_url(&self) -> String {
        match &self.token {
            Some(token) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", self.url, separator, urlencoding::encode(token))
            }
            None => self.url.clone(),
        }
    }
}

pub fn decode_frame(payload: &[u8]) -> Result<InboundEvent, TransportError> {
    Ok(serde_json::from_slice(payload)?)
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.connect_url())
            .await
            .map_err(|e| TransportError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!("WebSocket handshake with {} complete", self.url);

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundCommand>(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<TransportEvent>(INBOUND_CAPACITY);

        // Writer ends, and closes the socket, once every outbound sender is dropped
        tokio::spawn(async move {
            while let Some(command) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode {:?}: {}", command, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!("WebSocket write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => decode_frame(text.as_bytes()),
                    Ok(Message::Binary(bytes)) => decode_frame(&bytes),
                    Ok(Message::Close(frame)) => {
                        let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        let _ = inbound_tx.send(TransportEvent::Closed(reason)).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = inbound_tx
                            .send(TransportEvent::Failed(TransportError::Io(e.to_string())))
                            .await;
                        return;
                    }
                };

                match event {
                    Ok(event) => {
                        if inbound_tx.send(TransportEvent::Message(event)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Dropping malformed frame: {}", e),
                }
            }
            let _ = inbound_tx.send(TransportEvent::Closed(None)).await;
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
