//! Data channel wrapper over the native channel object

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, warn};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use super::messages::AuxMessage;
use crate::config::DataChannelMode;
use crate::{Error, Result};

/// Data channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataChannelState {
    /// Channel is being negotiated
    Connecting,
    /// Channel is open and ready for messages
    Open,
    /// Channel is closed
    Closed,
}

type OpenHandler = Arc<dyn Fn() + Send + Sync>;
type MessageHandler = Arc<dyn Fn(AuxMessage) + Send + Sync>;

/// Single-subscriber callback slots shared between the peer core and
/// every channel instance of a session (outgoing or remotely announced).
#[derive(Clone, Default)]
pub(crate) struct ChannelEvents {
    pub(crate) on_open: Arc<Mutex<Option<OpenHandler>>>,
    pub(crate) on_message: Arc<Mutex<Option<MessageHandler>>>,
}

/// Wrapper over `RTCDataChannel` providing open-state tracking and
/// best-effort sends for auxiliary messages.
pub struct DataChannel {
    /// Channel label
    label: String,

    /// The underlying native channel
    rtc_channel: Arc<RTCDataChannel>,

    /// Delivery mode
    mode: DataChannelMode,

    /// Current channel state
    state: Arc<RwLock<DataChannelState>>,

    /// Messages sent count
    messages_sent: Arc<RwLock<u64>>,

    /// Messages received count
    messages_received: Arc<RwLock<u64>>,
}

impl DataChannel {
    /// Create a new outgoing data channel on an existing peer connection
    pub(crate) async fn create(
        peer_connection: &RTCPeerConnection,
        label: &str,
        mode: DataChannelMode,
        events: ChannelEvents,
    ) -> Result<Self> {
        let init = RTCDataChannelInit {
            ordered: Some(mode.ordered()),
            max_retransmits: mode.max_retransmits(),
            ..Default::default()
        };

        let rtc_channel = peer_connection
            .create_data_channel(label, Some(init))
            .await
            .map_err(|e| {
                Error::DataChannelError(format!("Failed to create data channel: {}", e))
            })?;

        let channel = Self::wrap(rtc_channel, mode);
        channel.install_native_handlers(events);
        Ok(channel)
    }

    /// Wrap a channel announced by the remote peer.
    ///
    /// The delivery mode is derived from the announced channel's ordered
    /// flag.
    pub(crate) fn adopt(rtc_channel: Arc<RTCDataChannel>, events: ChannelEvents) -> Self {
        let mode = if rtc_channel.ordered() {
            DataChannelMode::Reliable
        } else {
            DataChannelMode::Unreliable
        };

        let channel = Self::wrap(rtc_channel, mode);
        channel.install_native_handlers(events);
        channel
    }

    fn wrap(rtc_channel: Arc<RTCDataChannel>, mode: DataChannelMode) -> Self {
        Self {
            label: rtc_channel.label().to_string(),
            rtc_channel,
            mode,
            state: Arc::new(RwLock::new(DataChannelState::Connecting)),
            messages_sent: Arc::new(RwLock::new(0u64)),
            messages_received: Arc::new(RwLock::new(0u64)),
        }
    }

    /// Register the native open/close/message handlers, dispatching into
    /// the shared single-subscriber event slots
    fn install_native_handlers(&self, events: ChannelEvents) {
        let state = Arc::clone(&self.state);
        let label = self.label.clone();
        let on_open = Arc::clone(&events.on_open);

        self.rtc_channel.on_open(Box::new(move || {
            let state = Arc::clone(&state);
            let label = label.clone();
            let on_open = Arc::clone(&on_open);
            Box::pin(async move {
                debug!(label = %label, "data channel opened");
                *state.write().await = DataChannelState::Open;
                if let Some(handler) = on_open.lock().await.as_ref() {
                    handler();
                }
            })
        }));

        let state = Arc::clone(&self.state);
        let label = self.label.clone();
        self.rtc_channel.on_close(Box::new(move || {
            let state = Arc::clone(&state);
            let label = label.clone();
            Box::pin(async move {
                debug!(label = %label, "data channel closed");
                *state.write().await = DataChannelState::Closed;
            })
        }));

        let label = self.label.clone();
        self.rtc_channel.on_error(Box::new(move |err| {
            let label = label.clone();
            Box::pin(async move {
                error!(label = %label, "data channel error: {}", err);
            })
        }));

        let label = self.label.clone();
        let messages_received = Arc::clone(&self.messages_received);
        let on_message = Arc::clone(&events.on_message);
        self.rtc_channel.on_message(Box::new(move |native_msg| {
            let label = label.clone();
            let messages_received = Arc::clone(&messages_received);
            let on_message = Arc::clone(&on_message);
            let data = native_msg.data.to_vec();

            Box::pin(async move {
                *messages_received.write().await += 1;
                match AuxMessage::from_bytes(&data) {
                    Ok(parsed) => {
                        if let Some(handler) = on_message.lock().await.as_ref() {
                            handler(parsed);
                        }
                    }
                    Err(e) => {
                        warn!(label = %label, "unparseable aux message dropped: {}", e);
                    }
                }
            })
        }));
    }

    /// Send an auxiliary message, best-effort.
    ///
    /// Returns `false` (with a logged warning) when the channel is not
    /// open or the payload cannot be sent; never errors. Auxiliary
    /// messages are not part of the correctness-critical path.
    pub async fn try_send(&self, msg: &AuxMessage) -> bool {
        if msg.exceeds_max_size() {
            warn!(
                label = %self.label,
                size = msg.size(),
                "aux message dropped: exceeds size cap"
            );
            return false;
        }

        let state = *self.state.read().await;
        if state != DataChannelState::Open {
            warn!(
                label = %self.label,
                ?state,
                "aux message dropped: data channel not open"
            );
            return false;
        }

        let bytes = match msg.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(label = %self.label, "aux message dropped: {}", e);
                return false;
            }
        };

        match self.rtc_channel.send(&Bytes::from(bytes)).await {
            Ok(_) => {
                *self.messages_sent.write().await += 1;
                true
            }
            Err(e) => {
                warn!(label = %self.label, "aux message send failed: {}", e);
                false
            }
        }
    }

    /// Get the channel label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the delivery mode
    pub fn mode(&self) -> DataChannelMode {
        self.mode
    }

    /// Get the current state
    pub async fn state(&self) -> DataChannelState {
        *self.state.read().await
    }

    /// Check if the channel is open
    pub async fn is_open(&self) -> bool {
        *self.state.read().await == DataChannelState::Open
    }

    /// Messages sent count
    pub async fn messages_sent(&self) -> u64 {
        *self.messages_sent.read().await
    }

    /// Messages received count
    pub async fn messages_received(&self) -> u64 {
        *self.messages_received.read().await
    }

    /// Close the channel
    pub(crate) async fn close(&self) -> Result<()> {
        self.rtc_channel
            .close()
            .await
            .map_err(|e| Error::DataChannelError(format!("Failed to close channel: {}", e)))?;

        *self.state.write().await = DataChannelState::Closed;
        debug!(label = %self.label, "data channel closed locally");
        Ok(())
    }
}
