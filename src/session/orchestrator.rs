//! Session orchestration over the peer core, capture manager and
//! signaling transport

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

use super::participant::{Participant, Role};
use crate::channels::AuxMessage;
use crate::config::SessionConfig;
use crate::media::{
    LocalMediaStream, MediaCaptureManager, MediaDevices, RemoteMediaStream, TrackKind,
};
use crate::peer::{ConnectionState, ConnectionStateMachine, PeerConnectionCore, TransportSignal};
use crate::signaling::{SignalingMessage, SignalingPayload, SignalingTransport};
use crate::{Error, Result};

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// This side called `leave()`
    Local,
    /// The remote side sent an `end` message
    Remote,
}

/// Read-only projection of the session for presentation layers.
///
/// The single read model UI code consumes; it never exposes mutable
/// core state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionViewState {
    /// Session identifier
    pub session_id: String,
    /// Canonical connection status
    pub connection: ConnectionState,
    /// Local participant, once joined
    pub local: Option<Participant>,
    /// Remote participant slot
    pub remote: Option<Participant>,
    /// Native stream id of the current remote track set
    pub remote_stream_id: Option<String>,
    /// Whether the auxiliary data channel is open
    pub aux_channel_open: bool,
    /// Time since the connection was first verified
    pub elapsed: Option<Duration>,
    /// Set once the session has ended, distinguishing who ended it
    pub ended: Option<EndReason>,
    /// Text of the most recent asynchronous failure, if any
    pub last_error: Option<String>,
}

impl SessionViewState {
    fn initial(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            connection: ConnectionState::New,
            local: None,
            remote: None,
            remote_stream_id: None,
            aux_channel_open: false,
            elapsed: None,
            ended: None,
            last_error: None,
        }
    }
}

/// Events flowing from the peer core callbacks into the pump task
enum EngineEvent {
    Signal(TransportSignal),
    LocalCandidate(RTCIceCandidateInit),
    RemoteTrack(Arc<TrackRemote>),
    ChannelOpen,
    Aux(AuxMessage),
}

type AuxHandler = Arc<dyn Fn(AuxMessage) + Send + Sync>;

struct Inner {
    session_id: String,
    config: SessionConfig,
    signaling: Arc<dyn SignalingTransport>,
    capture: MediaCaptureManager,
    core: PeerConnectionCore,
    machine: Mutex<ConnectionStateMachine>,
    role: RwLock<Option<Role>>,
    local: RwLock<Option<Participant>>,
    remote: RwLock<Option<Participant>>,
    remote_stream: RwLock<Option<RemoteMediaStream>>,
    joined: AtomicBool,
    aux_open: AtomicBool,
    restart_attempted: AtomicBool,
    connected_at: RwLock<Option<Instant>>,
    ended: RwLock<Option<EndReason>>,
    last_error: RwLock<Option<String>>,
    watch_tx: watch::Sender<SessionViewState>,
    pump: Mutex<Option<JoinHandle<()>>>,
    aux_handler: Mutex<Option<AuxHandler>>,
}

/// The public-facing coordination unit for one interview session.
///
/// Owns the peer connection, local media and the state machine for
/// exactly one session; constructed when the interview screen opens and
/// dropped when it closes. There is no shared state across sessions.
///
/// Commands: [`join`](Self::join), [`leave`](Self::leave),
/// [`toggle_audio`](Self::toggle_audio),
/// [`toggle_video`](Self::toggle_video),
/// [`send_aux_message`](Self::send_aux_message). State flows out through
/// [`snapshot`](Self::snapshot) and the [`watch`](Self::watch) channel.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    /// Create an orchestrator for `session_id`.
    ///
    /// Validates the configuration; no resources are claimed until
    /// `join`.
    pub fn new(
        session_id: impl Into<String>,
        config: SessionConfig,
        signaling: Arc<dyn SignalingTransport>,
        devices: Arc<dyn MediaDevices>,
    ) -> Result<Self> {
        config.validate()?;
        let session_id = session_id.into();
        let (watch_tx, _) = watch::channel(SessionViewState::initial(&session_id));

        Ok(Self {
            inner: Arc::new(Inner {
                session_id,
                config,
                signaling,
                capture: MediaCaptureManager::new(devices),
                core: PeerConnectionCore::new(),
                machine: Mutex::new(ConnectionStateMachine::new()),
                role: RwLock::new(None),
                local: RwLock::new(None),
                remote: RwLock::new(None),
                remote_stream: RwLock::new(None),
                joined: AtomicBool::new(false),
                aux_open: AtomicBool::new(false),
                restart_attempted: AtomicBool::new(false),
                connected_at: RwLock::new(None),
                ended: RwLock::new(None),
                last_error: RwLock::new(None),
                watch_tx,
                pump: Mutex::new(None),
                aux_handler: Mutex::new(None),
            }),
        })
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Join the session as `role`.
    ///
    /// Acquires local media, initializes the peer connection, registers
    /// the core callbacks and subscribes to signaling. The interviewer
    /// (caller) additionally opens the aux channel and sends the offer;
    /// the candidate waits for the inbound offer.
    ///
    /// Fails fast with [`Error::AlreadyJoined`] when already joined. On
    /// any mid-join failure, partially claimed resources are released
    /// and the session is joinable again.
    pub async fn join(&self, role: Role, display_name: &str) -> Result<Arc<LocalMediaStream>> {
        if self.inner.joined.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyJoined);
        }

        match self.join_inner(role, display_name).await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                if let Some(handle) = self.inner.pump.lock().await.take() {
                    handle.abort();
                }
                self.inner.core.teardown().await;
                self.inner.capture.release().await;
                self.inner.joined.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn join_inner(&self, role: Role, display_name: &str) -> Result<Arc<LocalMediaStream>> {
        let inner = &self.inner;
        info!(session_id = %inner.session_id, %role, "joining session");

        *inner.role.write().await = Some(role);
        *inner.ended.write().await = None;
        *inner.last_error.write().await = None;
        *inner.connected_at.write().await = None;
        *inner.remote_stream.write().await = None;
        inner.aux_open.store(false, Ordering::SeqCst);
        inner.restart_attempted.store(false, Ordering::SeqCst);
        *inner.machine.lock().await = ConnectionStateMachine::new();

        let stream = inner.capture.acquire(&inner.config.constraints).await?;
        if !inner.joined.load(Ordering::SeqCst) {
            // leave() raced the device prompt; discard the late tracks
            stream.stop_all();
            return Err(Error::InvalidState("session left during join".to_string()));
        }

        inner.core.initialize(&inner.config).await?;
        let engine_rx = self.register_core_handlers().await;
        inner.core.attach_local_tracks(&stream).await?;

        let mut local = Participant::new(display_name, role);
        local.online = true;
        local.audio_enabled = inner.config.constraints.audio;
        local.video_enabled = inner.config.constraints.video;
        *inner.local.write().await = Some(local);
        *inner.remote.write().await =
            Some(Participant::new(role.counterpart().as_str(), role.counterpart()));

        let sig_rx = inner
            .signaling
            .subscribe(&inner.session_id, role.as_str())
            .await?;
        let pump = tokio::spawn(Self::run_pump(self.clone(), sig_rx, engine_rx));
        *inner.pump.lock().await = Some(pump);

        if role.is_caller() {
            inner
                .core
                .open_data_channel(&inner.config.aux_channel_label, inner.config.aux_channel_mode)
                .await?;
            let sdp = inner.core.create_offer().await?;
            inner
                .signaling
                .send(SignalingMessage::offer(
                    &inner.session_id,
                    role.as_str(),
                    role.counterpart().as_str(),
                    sdp,
                ))
                .await?;
        }

        self.publish().await;
        Ok(stream)
    }

    /// Wire the core's single-subscriber callbacks into the engine
    /// channel consumed by the pump
    async fn register_core_handlers(&self) -> mpsc::UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = &self.inner.core;

        {
            let tx = tx.clone();
            core.on_transport_signal(move |signal| {
                let _ = tx.send(EngineEvent::Signal(signal));
            })
            .await;
        }
        {
            let tx = tx.clone();
            core.on_local_candidate(move |candidate| {
                let _ = tx.send(EngineEvent::LocalCandidate(candidate));
            })
            .await;
        }
        {
            let tx = tx.clone();
            core.on_remote_track(move |track| {
                let _ = tx.send(EngineEvent::RemoteTrack(track));
            })
            .await;
        }
        {
            let tx = tx.clone();
            core.on_data_channel_open(move || {
                let _ = tx.send(EngineEvent::ChannelOpen);
            })
            .await;
        }
        core.on_data_channel_message(move |msg| {
            let _ = tx.send(EngineEvent::Aux(msg));
        })
        .await;

        rx
    }

    /// Serialize signaling messages and core events onto one task
    async fn run_pump(
        orchestrator: SessionOrchestrator,
        mut sig_rx: mpsc::UnboundedReceiver<SignalingMessage>,
        mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        loop {
            if !orchestrator.inner.joined.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                msg = sig_rx.recv() => match msg {
                    Some(msg) => {
                        if let Err(e) = orchestrator.handle_signaling_message(msg).await {
                            warn!("signaling message failed: {}", e);
                            orchestrator.record_error(&e).await;
                        }
                    }
                    None => break,
                },
                event = engine_rx.recv() => match event {
                    Some(event) => orchestrator.handle_engine_event(event).await,
                    None => break,
                },
            }
        }

        debug!("session pump terminated");
    }

    /// Dispatch one inbound signaling message.
    ///
    /// Called by the pump; public for callers that deliver messages
    /// manually. Messages for another session or addressed to the other
    /// participant are dropped.
    pub async fn handle_signaling_message(&self, msg: SignalingMessage) -> Result<()> {
        let inner = &self.inner;

        if msg.session_id != inner.session_id {
            debug!(
                got = %msg.session_id,
                expected = %inner.session_id,
                "dropping message for different session"
            );
            return Ok(());
        }

        if !inner.joined.load(Ordering::SeqCst) {
            // A trailing `end` after teardown is expected; anything else
            // signals a usage error.
            return match msg.payload {
                SignalingPayload::End => Ok(()),
                _ => Err(Error::InvalidState("session not joined".to_string())),
            };
        }

        let role = match *inner.role.read().await {
            Some(role) => role,
            None => return Err(Error::InvalidState("session not joined".to_string())),
        };

        if msg.to != role.as_str() {
            debug!(to = %msg.to, "dropping message addressed to other participant");
            return Ok(());
        }

        debug!(kind = msg.kind(), from = %msg.from, "handling signaling message");

        match msg.payload {
            SignalingPayload::Offer { sdp } => {
                let answer = inner.core.create_answer(sdp).await?;
                inner
                    .signaling
                    .send(SignalingMessage::answer(
                        &inner.session_id,
                        role.as_str(),
                        &msg.from,
                        answer,
                    ))
                    .await?;
            }
            SignalingPayload::Answer { sdp } => {
                inner.core.accept_answer(sdp).await?;
            }
            SignalingPayload::IceCandidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                inner
                    .core
                    .add_remote_candidate(RTCIceCandidateInit {
                        candidate,
                        sdp_mid,
                        sdp_mline_index,
                        username_fragment: None,
                    })
                    .await?;
            }
            SignalingPayload::End => {
                info!("remote participant ended the session");
                self.shutdown(EndReason::Remote, false).await;
            }
        }

        self.publish().await;
        Ok(())
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Signal(signal) => self.on_transport_signal(signal).await,
            EngineEvent::LocalCandidate(candidate) => self.on_local_candidate(candidate).await,
            EngineEvent::RemoteTrack(track) => self.on_remote_track(track).await,
            EngineEvent::ChannelOpen => {
                debug!("aux channel open");
                self.inner.aux_open.store(true, Ordering::SeqCst);
                self.publish().await;
            }
            EngineEvent::Aux(msg) => {
                if let Some(handler) = self.inner.aux_handler.lock().await.as_ref() {
                    handler(msg);
                } else {
                    debug!("aux message dropped: no subscriber");
                }
            }
        }
    }

    async fn on_transport_signal(&self, signal: TransportSignal) {
        let inner = &self.inner;

        let transition = inner.machine.lock().await.apply(signal);
        let Some(state) = transition else { return };

        match state {
            ConnectionState::Connected => {
                if let Some(remote) = inner.remote.write().await.as_mut() {
                    remote.online = true;
                }
                let mut connected_at = inner.connected_at.write().await;
                if connected_at.is_none() {
                    *connected_at = Some(Instant::now());
                }
            }
            ConnectionState::Disconnected => {
                // Transient; recovery needs no external intervention.
                if let Some(remote) = inner.remote.write().await.as_mut() {
                    remote.online = false;
                }
            }
            ConnectionState::Failed => {
                if let Some(remote) = inner.remote.write().await.as_mut() {
                    remote.online = false;
                }
                let err = Error::NegotiationFailed("transport reported failure".to_string());
                *inner.last_error.write().await = Some(err.to_string());
                self.try_ice_restart().await;
            }
            _ => {}
        }

        self.publish().await;
    }

    /// One automatic ICE-restart re-offer per session attempt, caller
    /// side only. A second failure is surfaced, never retried silently.
    async fn try_ice_restart(&self) {
        let inner = &self.inner;

        let role = match *inner.role.read().await {
            Some(role) if role.is_caller() => role,
            _ => return,
        };
        if inner.restart_attempted.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("attempting ICE restart after transport failure");
        match inner.core.create_restart_offer().await {
            Ok(sdp) => {
                // A restart is a fresh negotiation: project it from New.
                *inner.machine.lock().await = ConnectionStateMachine::new();
                if let Err(e) = inner
                    .signaling
                    .send(SignalingMessage::offer(
                        &inner.session_id,
                        role.as_str(),
                        role.counterpart().as_str(),
                        sdp,
                    ))
                    .await
                {
                    warn!("ICE restart offer send failed: {}", e);
                }
            }
            Err(e) => warn!("ICE restart offer failed: {}", e),
        }
    }

    async fn on_local_candidate(&self, candidate: RTCIceCandidateInit) {
        let inner = &self.inner;
        let Some(role) = *inner.role.read().await else { return };

        let msg = SignalingMessage::ice_candidate(
            &inner.session_id,
            role.as_str(),
            role.counterpart().as_str(),
            candidate.candidate,
            candidate.sdp_mid,
            candidate.sdp_mline_index,
        );

        if let Err(e) = inner.signaling.send(msg).await {
            warn!("failed to trickle local candidate: {}", e);
        }
    }

    async fn on_remote_track(&self, track: Arc<TrackRemote>) {
        let inner = &self.inner;
        let stream_id = track.stream_id();

        {
            let mut slot = inner.remote_stream.write().await;
            let replace = slot.as_ref().map(|s| s.id() != stream_id).unwrap_or(true);
            if replace {
                // A fresh track set replaces the handle wholesale so
                // consumers never hold stale tracks after renegotiation.
                *slot = Some(RemoteMediaStream::new(stream_id.clone()));
            }
            if let Some(stream) = slot.as_mut() {
                stream.push(Arc::clone(&track));
            }
        }

        if let Some(remote) = inner.remote.write().await.as_mut() {
            match track.kind() {
                RTPCodecType::Audio => remote.audio_enabled = true,
                RTPCodecType::Video => remote.video_enabled = true,
                _ => {}
            }
        }

        debug!(stream_id = %stream_id, kind = %track.kind(), "remote track registered");
        self.publish().await;
    }

    /// Leave the session.
    ///
    /// Sends a best-effort `end` message, tears down the peer connection,
    /// releases local media and resets the state to `New`. Idempotent:
    /// repeated calls have no further side effects and never error.
    pub async fn leave(&self) {
        self.shutdown(EndReason::Local, true).await;
    }

    async fn shutdown(&self, reason: EndReason, send_end: bool) {
        let inner = &self.inner;

        if !inner.joined.swap(false, Ordering::SeqCst) {
            return;
        }

        info!(session_id = %inner.session_id, ?reason, "shutting session down");
        *inner.ended.write().await = Some(reason);

        if send_end {
            if let Some(role) = *inner.role.read().await {
                let msg = SignalingMessage::end(
                    &inner.session_id,
                    role.as_str(),
                    role.counterpart().as_str(),
                );
                if let Err(e) = inner.signaling.send(msg).await {
                    debug!("best-effort end message failed: {}", e);
                }
            }
        }

        inner.core.teardown().await;
        inner.capture.release().await;

        *inner.machine.lock().await = ConnectionStateMachine::new();
        *inner.remote_stream.write().await = None;
        *inner.connected_at.write().await = None;
        inner.aux_open.store(false, Ordering::SeqCst);
        if let Some(remote) = inner.remote.write().await.as_mut() {
            remote.online = false;
        }

        // The pump breaks on the cleared joined flag; abort also wakes
        // it when it is parked on the select.
        if let Some(handle) = inner.pump.lock().await.take() {
            if reason == EndReason::Local {
                handle.abort();
            }
        }

        self.publish().await;
    }

    /// Toggle microphone audio; returns the new enabled state
    pub async fn toggle_audio(&self) -> Result<bool> {
        self.toggle(TrackKind::Audio).await
    }

    /// Toggle camera video; returns the new enabled state
    pub async fn toggle_video(&self) -> Result<bool> {
        self.toggle(TrackKind::Video).await
    }

    async fn toggle(&self, kind: TrackKind) -> Result<bool> {
        let inner = &self.inner;

        if !inner.joined.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("session not joined".to_string()));
        }

        let enabled = inner.capture.toggle(kind).await?;

        if let Some(local) = inner.local.write().await.as_mut() {
            match kind {
                TrackKind::Audio => local.audio_enabled = enabled,
                TrackKind::Video => local.video_enabled = enabled,
            }
        }

        self.publish().await;
        Ok(enabled)
    }

    /// Send a structured message on the aux channel, best-effort.
    ///
    /// Returns whether the message was handed to an open channel.
    pub async fn send_aux_message(&self, msg: &AuxMessage) -> bool {
        self.inner.core.send_aux(msg).await
    }

    /// Register the single subscriber for inbound aux messages
    /// (replaces any previous one)
    pub async fn on_aux_message(&self, handler: impl Fn(AuxMessage) + Send + Sync + 'static) {
        *self.inner.aux_handler.lock().await = Some(Arc::new(handler));
    }

    /// The current remote track set, if media has arrived
    pub async fn remote_stream(&self) -> Option<RemoteMediaStream> {
        self.inner.remote_stream.read().await.clone()
    }

    /// Build the read-only view of the session
    pub async fn snapshot(&self) -> SessionViewState {
        let inner = &self.inner;

        SessionViewState {
            session_id: inner.session_id.clone(),
            connection: inner.machine.lock().await.state(),
            local: inner.local.read().await.clone(),
            remote: inner.remote.read().await.clone(),
            remote_stream_id: inner
                .remote_stream
                .read()
                .await
                .as_ref()
                .map(|s| s.id().to_string()),
            aux_channel_open: inner.aux_open.load(Ordering::SeqCst),
            elapsed: inner.connected_at.read().await.map(|t| t.elapsed()),
            ended: *inner.ended.read().await,
            last_error: inner.last_error.read().await.clone(),
        }
    }

    /// Subscribe to the "state changed" event.
    ///
    /// The receiver holds the latest [`SessionViewState`]; UI layers
    /// re-render on change notifications.
    pub fn watch(&self) -> watch::Receiver<SessionViewState> {
        self.inner.watch_tx.subscribe()
    }

    async fn record_error(&self, error: &Error) {
        *self.inner.last_error.write().await = Some(error.to_string());
        self.publish().await;
    }

    async fn publish(&self) {
        let view = self.snapshot().await;
        self.inner.watch_tx.send_replace(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaConstraints, SyntheticDevices};
    use crate::signaling::MemorySignaling;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct DenyingDevices;

    #[async_trait]
    impl MediaDevices for DenyingDevices {
        async fn open(
            &self,
            _constraints: &MediaConstraints,
            _stream_id: &str,
        ) -> Result<Vec<Arc<crate::media::LocalTrack>>> {
            Err(Error::PermissionDenied("camera access refused".to_string()))
        }
    }

    fn orchestrator_with(devices: Arc<dyn MediaDevices>) -> SessionOrchestrator {
        SessionOrchestrator::new(
            "S1",
            SessionConfig::default(),
            Arc::new(MemorySignaling::new()),
            devices,
        )
        .unwrap()
    }

    fn orchestrator() -> SessionOrchestrator {
        orchestrator_with(Arc::new(SyntheticDevices::new()))
    }

    #[tokio::test]
    async fn test_join_twice_fails_fast() {
        let session = orchestrator();
        session.join(Role::Interviewer, "Avery").await.unwrap();

        let result = session.join(Role::Interviewer, "Avery").await;
        assert!(matches!(result, Err(Error::AlreadyJoined)));

        session.leave().await;
    }

    #[tokio::test]
    async fn test_permission_denied_leaves_state_new() {
        let session = orchestrator_with(Arc::new(DenyingDevices));

        let result = session.join(Role::Candidate, "Dana").await;
        assert!(matches!(result, Err(Error::PermissionDenied(_))));

        let view = session.snapshot().await;
        assert_eq!(view.connection, ConnectionState::New);

        // The failed join did not leave the session marked as joined.
        let retry = session.join(Role::Candidate, "Dana").await;
        assert!(matches!(retry, Err(Error::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let session = orchestrator();
        session.join(Role::Interviewer, "Avery").await.unwrap();

        session.leave().await;
        let after_first = session.snapshot().await;

        session.leave().await;
        session.leave().await;
        let after_repeat = session.snapshot().await;

        assert_eq!(after_first.connection, ConnectionState::New);
        assert_eq!(after_first.ended, Some(EndReason::Local));
        assert_eq!(after_repeat.ended, Some(EndReason::Local));
    }

    #[tokio::test]
    async fn test_toggle_audio_round_trip() {
        let session = orchestrator();
        let stream = session.join(Role::Interviewer, "Avery").await.unwrap();
        let audio = stream.tracks_of(TrackKind::Audio).next().unwrap().clone();

        let off = session.toggle_audio().await.unwrap();
        assert!(!off);
        assert!(!audio.is_enabled());
        assert!(!session.snapshot().await.local.unwrap().audio_enabled);

        let on = session.toggle_audio().await.unwrap();
        assert!(on);
        assert!(audio.is_enabled());
        assert!(session.snapshot().await.local.unwrap().audio_enabled);

        session.leave().await;
    }

    #[tokio::test]
    async fn test_toggle_without_join_fails() {
        let session = orchestrator();
        assert!(matches!(
            session.toggle_audio().await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_then_connect_recovers() {
        let session = orchestrator();
        session.join(Role::Interviewer, "Avery").await.unwrap();

        session.on_transport_signal(TransportSignal::Connecting).await;
        session.on_transport_signal(TransportSignal::Connected).await;
        session
            .on_transport_signal(TransportSignal::Disconnected)
            .await;

        let view = session.snapshot().await;
        assert_eq!(view.connection, ConnectionState::Disconnected);
        assert!(!view.remote.unwrap().online);

        session.on_transport_signal(TransportSignal::Connected).await;

        let view = session.snapshot().await;
        assert_eq!(view.connection, ConnectionState::Connected);
        assert!(view.remote.unwrap().online);
        assert!(view.elapsed.is_some());

        session.leave().await;
    }

    #[tokio::test]
    async fn test_failure_is_surfaced_not_thrown() {
        let session = orchestrator();
        session.join(Role::Candidate, "Dana").await.unwrap();

        session.on_transport_signal(TransportSignal::Connecting).await;
        session.on_transport_signal(TransportSignal::Failed).await;

        let view = session.snapshot().await;
        assert_eq!(view.connection, ConnectionState::Failed);
        assert!(view.last_error.unwrap().contains("Negotiation failed"));

        session.leave().await;
    }

    #[tokio::test]
    async fn test_rejoin_after_failed_session_succeeds() {
        let session = orchestrator();
        session.join(Role::Interviewer, "Avery").await.unwrap();
        session.on_transport_signal(TransportSignal::Failed).await;
        session.leave().await;

        // Prior teardown released everything; a fresh attempt works.
        session.join(Role::Interviewer, "Avery").await.unwrap();
        let view = session.snapshot().await;
        assert!(view.ended.is_none());

        session.leave().await;
    }

    #[tokio::test]
    async fn test_offer_before_join_is_invalid_state() {
        let session = orchestrator();
        let msg = SignalingMessage::offer("S1", "interviewer", "candidate", "v=0".to_string());

        let result = session.handle_signaling_message(msg).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_message_for_other_session_is_dropped() {
        let session = orchestrator();
        session.join(Role::Candidate, "Dana").await.unwrap();

        let msg = SignalingMessage::offer("OTHER", "interviewer", "candidate", "v=0".to_string());
        assert!(session.handle_signaling_message(msg).await.is_ok());

        session.leave().await;
    }

    #[tokio::test]
    async fn test_watch_observes_changes() {
        let session = orchestrator();
        let mut rx = session.watch();
        assert_eq!(rx.borrow().connection, ConnectionState::New);

        session.join(Role::Interviewer, "Avery").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().local.is_some());

        session.leave().await;
    }
}
