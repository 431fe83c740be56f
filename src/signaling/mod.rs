//! Signaling transport contract and built-in transports
//!
//! The session core never talks to a signaling service directly; it only
//! requires [`SignalingTransport`]. `MemorySignaling` routes messages
//! in-process (tests, loopback runs); `WebSocketSignaling` relays them
//! through an external WebSocket signaling service.

mod memory;
pub mod protocol;
mod websocket;

pub use memory::MemorySignaling;
pub use protocol::{SignalingMessage, SignalingPayload};
pub use websocket::WebSocketSignaling;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Contract the session core requires from an external signaling service.
///
/// Implementations deliver [`SignalingMessage`] values addressed by
/// `session_id`/`to` to the correct peer, at-least-once, with no ordering
/// guarantee across distinct message tags.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    /// Send a message to the peer addressed by `msg.session_id`/`msg.to`
    async fn send(&self, msg: SignalingMessage) -> Result<()>;

    /// Subscribe to messages addressed to `participant_id` within
    /// `session_id`.
    ///
    /// Subscribing again for the same address replaces the previous
    /// subscription.
    async fn subscribe(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<SignalingMessage>>;
}
