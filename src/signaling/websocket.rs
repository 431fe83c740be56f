//! WebSocket signaling client for relaying messages through an external
//! signaling service

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{SignalingMessage, SignalingTransport};
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type SubscriberMap = HashMap<(String, String), mpsc::UnboundedSender<SignalingMessage>>;

/// WebSocket-backed signaling transport.
///
/// Relays [`SignalingMessage`] values as JSON text frames through an
/// external signaling service. The service itself (fan-out, persistence,
/// authentication) is outside this crate; this is only the client
/// adapter.
pub struct WebSocketSignaling {
    /// Outgoing frame sender feeding the writer task
    tx: mpsc::UnboundedSender<Message>,

    /// Local subscriptions the reader task routes into
    subscribers: Arc<RwLock<SubscriberMap>>,
}

impl WebSocketSignaling {
    /// Connect to the signaling service.
    ///
    /// Spawns background tasks for sending and receiving frames; both
    /// terminate when the socket closes.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "connecting to signaling service");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocketError(format!("Failed to connect: {}", e)))?;

        info!("connected to signaling service");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let subscribers: Arc<RwLock<SubscriberMap>> = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, Arc::clone(&subscribers)));

        Ok(Self { tx, subscribers })
    }

    /// Sender task: forwards frames from the channel to the socket
    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("failed to send WebSocket frame: {}", e);
                break;
            }
        }

        debug!("signaling sender task terminated");
    }

    /// Receiver task: parses inbound frames and routes them to local
    /// subscriptions
    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        subscribers: Arc<RwLock<SubscriberMap>>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let msg = match SignalingMessage::from_json(&text) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!("ignoring unparseable signaling frame: {}", e);
                            continue;
                        }
                    };

                    let key = (msg.session_id.clone(), msg.to.clone());
                    let map = subscribers.read().await;
                    match map.get(&key) {
                        Some(tx) => {
                            if tx.send(msg).is_err() {
                                debug!("subscriber receiver dropped; frame discarded");
                            }
                        }
                        None => {
                            debug!(
                                session_id = %key.0,
                                to = %key.1,
                                "no local subscription for inbound frame"
                            );
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("signaling socket closed by server");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        debug!("signaling receiver task terminated");
    }
}

#[async_trait]
impl SignalingTransport for WebSocketSignaling {
    async fn send(&self, msg: SignalingMessage) -> Result<()> {
        let json = msg.to_json()?;
        debug!(kind = msg.kind(), to = %msg.to, "sending signaling frame");

        self.tx
            .send(Message::Text(json))
            .map_err(|e| Error::SignalingError(format!("Failed to queue frame: {}", e)))?;

        Ok(())
    }

    async fn subscribe(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<SignalingMessage>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .write()
            .await
            .insert((session_id.to_string(), participant_id.to_string()), tx);
        debug!(session_id, participant_id, "signaling subscription registered");
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        // Nothing listens on a reserved port; the connect must fail
        // with a transport error rather than hang.
        let result = WebSocketSignaling::connect("ws://127.0.0.1:9/").await;
        assert!(matches!(result, Err(Error::WebSocketError(_))));
    }
}

