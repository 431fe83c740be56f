//! WebRTC peer connection wrapper with a denoised event surface

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use super::state::TransportSignal;
use crate::channels::{AuxMessage, ChannelEvents, DataChannel};
use crate::config::{DataChannelMode, SessionConfig};
use crate::media::LocalMediaStream;
use crate::{Error, Result};

type RemoteTrackHandler = Arc<dyn Fn(Arc<TrackRemote>) + Send + Sync>;
type LocalCandidateHandler = Arc<dyn Fn(RTCIceCandidateInit) + Send + Sync>;
type TransportSignalHandler = Arc<dyn Fn(TransportSignal) + Send + Sync>;

/// Single-subscriber callback slots.
///
/// Re-registering replaces the previous subscriber; events fired while a
/// slot is empty are dropped, never buffered.
#[derive(Default)]
struct Handlers {
    remote_track: Mutex<Option<RemoteTrackHandler>>,
    local_candidate: Mutex<Option<LocalCandidateHandler>>,
    transport_signal: Mutex<Option<TransportSignalHandler>>,
    channel: ChannelEvents,
}

/// Wrapper owning the native peer connection.
///
/// Presents guarded entry points (`InvalidState` before `initialize` or
/// after `teardown`), buffers remote candidates that arrive before the
/// remote description, and re-expresses the native event callbacks as
/// explicit single-subscriber registrations.
pub struct PeerConnectionCore {
    /// The native connection; `None` before `initialize` and after
    /// `teardown`
    pc: RwLock<Option<Arc<RTCPeerConnection>>>,

    /// Callback subscriber slots
    handlers: Arc<Handlers>,

    /// Remote candidates received before the remote description was set
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,

    /// Whether a remote description has been applied
    remote_description_set: AtomicBool,

    /// The auxiliary data channel, once negotiated
    data_channel: Arc<RwLock<Option<DataChannel>>>,

    /// RTP senders for attached local tracks (retained so the native
    /// stack keeps them alive)
    senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

impl Default for PeerConnectionCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerConnectionCore {
    /// Create an uninitialized core
    pub fn new() -> Self {
        Self {
            pc: RwLock::new(None),
            handlers: Arc::new(Handlers::default()),
            pending_candidates: Mutex::new(Vec::new()),
            remote_description_set: AtomicBool::new(false),
            data_channel: Arc::new(RwLock::new(None)),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Create the native peer connection from the configured ICE servers.
    ///
    /// Callable at most once per logical session attempt; re-initializing
    /// requires a `teardown` first.
    pub async fn initialize(&self, config: &SessionConfig) -> Result<()> {
        let mut slot = self.pc.write().await;
        if slot.is_some() {
            return Err(Error::InvalidState(
                "peer connection already initialized; teardown first".to_string(),
            ));
        }

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::WebRtcError(format!("Failed to register interceptors: {}", e))
            })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::PeerConnectionError(format!("Failed to create peer connection: {}", e))
        })?);

        self.install_native_handlers(&pc);

        self.remote_description_set.store(false, Ordering::SeqCst);
        self.pending_candidates.lock().await.clear();
        *slot = Some(pc);

        info!("peer connection initialized");
        Ok(())
    }

    /// Whether `initialize` has been called and `teardown` has not
    pub async fn is_initialized(&self) -> bool {
        self.pc.read().await.is_some()
    }

    /// Wire the native callbacks to the subscriber slots
    fn install_native_handlers(&self, pc: &Arc<RTCPeerConnection>) {
        let handlers = Arc::clone(&self.handlers);
        pc.on_peer_connection_state_change(Box::new(move |state| {
            let handlers = Arc::clone(&handlers);
            Box::pin(async move {
                if let Some(signal) = TransportSignal::from_peer_state(state) {
                    if let Some(handler) = handlers.transport_signal.lock().await.as_ref() {
                        handler(signal);
                    }
                }
            })
        }));

        // `completed` only arrives on the ICE state callback.
        let handlers = Arc::clone(&self.handlers);
        pc.on_ice_connection_state_change(Box::new(move |state| {
            let handlers = Arc::clone(&handlers);
            Box::pin(async move {
                if let Some(signal) = TransportSignal::from_ice_state(state) {
                    if let Some(handler) = handlers.transport_signal.lock().await.as_ref() {
                        handler(signal);
                    }
                }
            })
        }));

        let handlers = Arc::clone(&self.handlers);
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let handlers = Arc::clone(&handlers);
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("local ICE gathering complete");
                    return;
                };

                match candidate.to_json() {
                    Ok(init) => {
                        if let Some(handler) = handlers.local_candidate.lock().await.as_ref() {
                            handler(init);
                        }
                    }
                    Err(e) => warn!("failed to convert local candidate: {}", e),
                }
            })
        }));

        let handlers = Arc::clone(&self.handlers);
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let handlers = Arc::clone(&handlers);
            Box::pin(async move {
                debug!(kind = %track.kind(), "remote track arrived");
                if let Some(handler) = handlers.remote_track.lock().await.as_ref() {
                    handler(track);
                }
            })
        }));

        // Callee side: adopt the channel announced by the caller.
        let handlers = Arc::clone(&self.handlers);
        let dc_slot = Arc::clone(&self.data_channel);
        pc.on_data_channel(Box::new(move |rtc_channel| {
            let handlers = Arc::clone(&handlers);
            let dc_slot = Arc::clone(&dc_slot);
            Box::pin(async move {
                debug!(label = rtc_channel.label(), "remote data channel announced");
                let channel = DataChannel::adopt(rtc_channel, handlers.channel.clone());
                *dc_slot.write().await = Some(channel);
            })
        }));
    }

    /// Clone out the native handle, or fail with `InvalidState`
    async fn pc_handle(&self) -> Result<Arc<RTCPeerConnection>> {
        self.pc
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::InvalidState("peer connection not initialized".to_string()))
    }

    /// Attach every track of the local stream, retaining the senders
    pub async fn attach_local_tracks(&self, stream: &LocalMediaStream) -> Result<()> {
        let pc = self.pc_handle().await?;

        for track in stream.tracks() {
            let sender = pc
                .add_track(track.rtc() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::MediaTrackError(format!("Failed to add track: {}", e)))?;
            self.senders.lock().await.push(sender);
        }

        debug!(
            stream_id = stream.id(),
            tracks = stream.tracks().len(),
            "local tracks attached"
        );
        Ok(())
    }

    /// Create the auxiliary data channel (caller side, before the offer)
    pub async fn open_data_channel(&self, label: &str, mode: DataChannelMode) -> Result<()> {
        let pc = self.pc_handle().await?;

        if self.data_channel.read().await.is_some() {
            return Err(Error::DataChannelError(
                "data channel already exists".to_string(),
            ));
        }

        let channel = DataChannel::create(&pc, label, mode, self.handlers.channel.clone()).await?;
        *self.data_channel.write().await = Some(channel);

        debug!(label, "data channel created");
        Ok(())
    }

    /// Create an SDP offer and set it as the local description.
    ///
    /// Valid only when local media has been attached.
    pub async fn create_offer(&self) -> Result<String> {
        self.offer(false).await
    }

    /// Create an ICE-restart offer on the existing connection
    pub async fn create_restart_offer(&self) -> Result<String> {
        self.offer(true).await
    }

    async fn offer(&self, ice_restart: bool) -> Result<String> {
        let pc = self.pc_handle().await?;

        if self.senders.lock().await.is_empty() {
            return Err(Error::InvalidState(
                "local media must be attached before creating an offer".to_string(),
            ));
        }

        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });

        let offer = pc
            .create_offer(options)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create offer: {}", e)))?;

        pc.set_local_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local = pc.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting offer".to_string())
        })?;

        debug!(ice_restart, "created SDP offer");
        Ok(local.sdp)
    }

    /// Answer a remote offer.
    ///
    /// Sets the remote description, drains candidates buffered before it,
    /// then creates and sets the local answer.
    pub async fn create_answer(&self, remote_offer: String) -> Result<String> {
        let pc = self.pc_handle().await?;

        let offer = RTCSessionDescription::offer(remote_offer)
            .map_err(|e| Error::SdpError(format!("Failed to parse offer: {}", e)))?;

        pc.set_remote_description(offer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        self.remote_description_set.store(true, Ordering::SeqCst);
        self.drain_pending_candidates(&pc).await;

        let answer = pc
            .create_answer(None)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to create answer: {}", e)))?;

        pc.set_local_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set local description: {}", e)))?;

        let local = pc.local_description().await.ok_or_else(|| {
            Error::SdpError("No local description after setting answer".to_string())
        })?;

        debug!("created SDP answer");
        Ok(local.sdp)
    }

    /// Accept the remote answer to a previously created offer
    pub async fn accept_answer(&self, remote_answer: String) -> Result<()> {
        let pc = self.pc_handle().await?;

        let answer = RTCSessionDescription::answer(remote_answer)
            .map_err(|e| Error::SdpError(format!("Failed to parse answer: {}", e)))?;

        pc.set_remote_description(answer)
            .await
            .map_err(|e| Error::SdpError(format!("Failed to set remote description: {}", e)))?;

        self.remote_description_set.store(true, Ordering::SeqCst);
        self.drain_pending_candidates(&pc).await;

        debug!("remote answer accepted");
        Ok(())
    }

    /// Apply a remote candidate, or buffer it (FIFO) while the remote
    /// description is not yet set.
    ///
    /// Applying a candidate before the description exists fails on the
    /// native stack, so early arrivals are queued and drained, in
    /// arrival order, right after the description is applied.
    pub async fn add_remote_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        let pc = self.pc_handle().await?;

        if !self.remote_description_set.load(Ordering::SeqCst) {
            let mut pending = self.pending_candidates.lock().await;
            pending.push(candidate);
            debug!(queued = pending.len(), "buffered early remote candidate");
            return Ok(());
        }

        pc.add_ice_candidate(candidate)
            .await
            .map_err(|e| Error::IceCandidateError(format!("Failed to add candidate: {}", e)))
    }

    /// Number of buffered remote candidates awaiting the description
    pub async fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.lock().await.len()
    }

    /// Apply buffered candidates in arrival order.
    ///
    /// A candidate the native stack rejects is logged and skipped;
    /// individual candidates are best-effort.
    async fn drain_pending_candidates(&self, pc: &Arc<RTCPeerConnection>) {
        let drained: Vec<RTCIceCandidateInit> =
            std::mem::take(&mut *self.pending_candidates.lock().await);
        if drained.is_empty() {
            return;
        }

        debug!(count = drained.len(), "applying buffered remote candidates");
        for candidate in drained {
            if let Err(e) = pc.add_ice_candidate(candidate).await {
                warn!("buffered candidate rejected: {}", e);
            }
        }
    }

    /// Send an auxiliary message, best-effort.
    ///
    /// No-ops with a logged warning and returns `false` when the data
    /// channel is absent or not open; never errors.
    pub async fn send_aux(&self, msg: &AuxMessage) -> bool {
        let guard = self.data_channel.read().await;
        match guard.as_ref() {
            Some(channel) => channel.try_send(msg).await,
            None => {
                warn!("aux message dropped: data channel not negotiated");
                false
            }
        }
    }

    /// Register the remote-track subscriber (replaces any previous one)
    pub async fn on_remote_track(&self, handler: impl Fn(Arc<TrackRemote>) + Send + Sync + 'static) {
        *self.handlers.remote_track.lock().await = Some(Arc::new(handler));
    }

    /// Register the local-candidate subscriber (replaces any previous one)
    pub async fn on_local_candidate(
        &self,
        handler: impl Fn(RTCIceCandidateInit) + Send + Sync + 'static,
    ) {
        *self.handlers.local_candidate.lock().await = Some(Arc::new(handler));
    }

    /// Register the transport-signal subscriber (replaces any previous
    /// one)
    pub async fn on_transport_signal(
        &self,
        handler: impl Fn(TransportSignal) + Send + Sync + 'static,
    ) {
        *self.handlers.transport_signal.lock().await = Some(Arc::new(handler));
    }

    /// Register the data-channel-open subscriber (replaces any previous
    /// one)
    pub async fn on_data_channel_open(&self, handler: impl Fn() + Send + Sync + 'static) {
        *self.handlers.channel.on_open.lock().await = Some(Arc::new(handler));
    }

    /// Register the aux-message subscriber (replaces any previous one)
    pub async fn on_data_channel_message(
        &self,
        handler: impl Fn(AuxMessage) + Send + Sync + 'static,
    ) {
        *self.handlers.channel.on_message.lock().await = Some(Arc::new(handler));
    }

    /// Release every native resource.
    ///
    /// Stops the retained senders, closes the data channel and the
    /// connection. Idempotent and safe to call from any state, including
    /// before `initialize`.
    pub async fn teardown(&self) {
        let pc = self.pc.write().await.take();

        self.pending_candidates.lock().await.clear();
        self.remote_description_set.store(false, Ordering::SeqCst);

        let Some(pc) = pc else {
            debug!("teardown: no active peer connection");
            return;
        };

        let senders: Vec<Arc<RTCRtpSender>> = std::mem::take(&mut *self.senders.lock().await);
        for sender in senders {
            if let Err(e) = sender.stop().await {
                debug!("sender stop failed: {}", e);
            }
        }

        if let Some(channel) = self.data_channel.write().await.take() {
            if let Err(e) = channel.close().await {
                debug!("data channel close failed: {}", e);
            }
        }

        if let Err(e) = pc.close().await {
            warn!("peer connection close failed: {}", e);
        }

        info!("peer connection torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaConstraints, MediaDevices, SyntheticDevices};

    async fn synthetic_stream() -> LocalMediaStream {
        let tracks = SyntheticDevices::new()
            .open(&MediaConstraints::default(), "stream-test")
            .await
            .unwrap();
        LocalMediaStream::new("stream-test".to_string(), tracks)
    }

    fn candidate(raw: &str) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: raw.to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    #[tokio::test]
    async fn test_initialize_twice_fails() {
        let core = PeerConnectionCore::new();
        let config = SessionConfig::default();

        core.initialize(&config).await.unwrap();
        let result = core.initialize(&config).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let core = PeerConnectionCore::new();

        assert!(matches!(
            core.create_offer().await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            core.add_remote_candidate(candidate("candidate:0 1 udp 1 127.0.0.1 50000 typ host"))
                .await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            core.accept_answer("v=0".to_string()).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_offer_requires_attached_media() {
        let core = PeerConnectionCore::new();
        core.initialize(&SessionConfig::default()).await.unwrap();

        let result = core.create_offer().await;
        assert!(matches!(result, Err(Error::InvalidState(_))));

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_offer_after_attach_succeeds() {
        let core = PeerConnectionCore::new();
        core.initialize(&SessionConfig::default()).await.unwrap();
        core.attach_local_tracks(&synthetic_stream().await)
            .await
            .unwrap();

        let sdp = core.create_offer().await.unwrap();
        assert!(sdp.contains("audio"));
        assert!(sdp.contains("video"));

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_early_candidates_buffer_in_fifo_order() {
        let core = PeerConnectionCore::new();
        core.initialize(&SessionConfig::default()).await.unwrap();

        core.add_remote_candidate(candidate("candidate:first"))
            .await
            .unwrap();
        core.add_remote_candidate(candidate("candidate:second"))
            .await
            .unwrap();
        core.add_remote_candidate(candidate("candidate:third"))
            .await
            .unwrap();

        assert_eq!(core.pending_candidate_count().await, 3);
        {
            let pending = core.pending_candidates.lock().await;
            let order: Vec<&str> = pending.iter().map(|c| c.candidate.as_str()).collect();
            assert_eq!(
                order,
                vec!["candidate:first", "candidate:second", "candidate:third"]
            );
        }

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_answer_drains_buffered_candidates() {
        let caller = PeerConnectionCore::new();
        caller.initialize(&SessionConfig::default()).await.unwrap();
        caller
            .attach_local_tracks(&synthetic_stream().await)
            .await
            .unwrap();
        let offer = caller.create_offer().await.unwrap();

        let callee = PeerConnectionCore::new();
        callee.initialize(&SessionConfig::default()).await.unwrap();
        callee
            .attach_local_tracks(&synthetic_stream().await)
            .await
            .unwrap();

        callee
            .add_remote_candidate(candidate("candidate:early"))
            .await
            .unwrap();
        assert_eq!(callee.pending_candidate_count().await, 1);

        let answer = callee.create_answer(offer).await.unwrap();
        assert!(!answer.is_empty());
        assert_eq!(callee.pending_candidate_count().await, 0);

        caller.accept_answer(answer).await.unwrap();

        caller.teardown().await;
        callee.teardown().await;
    }

    #[tokio::test]
    async fn test_send_aux_without_channel_is_noop() {
        let core = PeerConnectionCore::new();
        core.initialize(&SessionConfig::default()).await.unwrap();

        assert!(!core.send_aux(&AuxMessage::text("dropped")).await);

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_duplicate_data_channel_fails() {
        let core = PeerConnectionCore::new();
        core.initialize(&SessionConfig::default()).await.unwrap();

        core.open_data_channel("scores", DataChannelMode::Reliable)
            .await
            .unwrap();
        let result = core
            .open_data_channel("scores", DataChannelMode::Reliable)
            .await;
        assert!(matches!(result, Err(Error::DataChannelError(_))));

        core.teardown().await;
    }

    #[tokio::test]
    async fn test_teardown_idempotent_and_reinitializable() {
        let core = PeerConnectionCore::new();

        // Safe before initialize.
        core.teardown().await;

        core.initialize(&SessionConfig::default()).await.unwrap();
        assert!(core.is_initialized().await);

        core.teardown().await;
        core.teardown().await;
        assert!(!core.is_initialized().await);

        // A fresh attempt succeeds without leaked state.
        core.initialize(&SessionConfig::default()).await.unwrap();
        assert_eq!(core.pending_candidate_count().await, 0);
        core.teardown().await;
    }
}
