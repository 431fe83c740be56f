//! In-process signaling hub for tests and loopback sessions

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::{SignalingMessage, SignalingTransport};
use crate::Result;

/// In-process signaling transport.
///
/// Routes messages between subscribers registered on the same hub,
/// keyed by `(session_id, participant_id)`. Messages addressed to an
/// absent subscriber are dropped with a warning, matching the
/// best-effort delivery contract of real signaling services.
#[derive(Default)]
pub struct MemorySignaling {
    subscribers:
        Arc<RwLock<HashMap<(String, String), mpsc::UnboundedSender<SignalingMessage>>>>,
}

impl MemorySignaling {
    /// Create a new hub. Both sides of a session subscribe to the same
    /// hub instance.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalingTransport for MemorySignaling {
    async fn send(&self, msg: SignalingMessage) -> Result<()> {
        let key = (msg.session_id.clone(), msg.to.clone());
        let subscribers = self.subscribers.read().await;

        match subscribers.get(&key) {
            Some(tx) => {
                debug!(
                    session_id = %msg.session_id,
                    to = %msg.to,
                    kind = msg.kind(),
                    "routing signaling message"
                );
                if tx.send(msg).is_err() {
                    warn!("signaling subscriber dropped its receiver; message lost");
                }
            }
            None => {
                warn!(
                    session_id = %key.0,
                    to = %key.1,
                    "no subscriber for signaling message; dropping"
                );
            }
        }

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
