//! Local and remote media stream handles

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::{Error, Result};

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone audio
    Audio,
    /// Camera video
    Video,
}

impl TrackKind {
    /// Kind name as used in track ids and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    /// Codec capability advertised for locally produced tracks of this
    /// kind (Opus for audio, VP8 for video)
    fn codec_capability(&self) -> RTCRtpCodecCapability {
        match self {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                channels: 0,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally produced, sample-fed media track.
///
/// Disabling a track does not remove it from the peer connection: the
/// negotiated sender stays alive and outgoing samples are dropped
/// instead, so mute/unmute never triggers renegotiation.
pub struct LocalTrack {
    kind: TrackKind,
    rtc_track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl LocalTrack {
    /// Create a track of the given kind belonging to `stream_id`
    pub(crate) fn new(kind: TrackKind, stream_id: &str) -> Self {
        let id = format!("{}-{}", kind.as_str(), uuid::Uuid::new_v4());
        let rtc_track = Arc::new(TrackLocalStaticSample::new(
            kind.codec_capability(),
            id,
            stream_id.to_string(),
        ));

        Self {
            kind,
            rtc_track,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// Get the track kind
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Whether samples written to this track are currently forwarded
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable sample forwarding without detaching the track
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            debug!(kind = %self.kind, enabled, "local track toggled");
        }
    }

    /// Whether this track has been stopped by `release()`
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Permanently stop the track; further samples are discarded
    pub(crate) fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(kind = %self.kind, "local track stopped");
        }
    }

    /// Write a media sample to the track.
    ///
    /// Samples are silently dropped while the track is disabled or after
    /// it has been stopped.
    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        if self.is_stopped() || !self.is_enabled() {
            return Ok(());
        }

        self.rtc_track
            .write_sample(sample)
            .await
            .map_err(|e| Error::MediaTrackError(format!("Failed to write sample: {}", e)))
    }

    /// The underlying native track, for attaching to a peer connection
    pub(crate) fn rtc(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.rtc_track)
    }
}

/// The set of locally captured tracks for one session
pub struct LocalMediaStream {
    id: String,
    tracks: Vec<Arc<LocalTrack>>,
}

impl LocalMediaStream {
    pub(crate) fn new(id: String, tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self { id, tracks }
    }

    /// Stream identifier (shared by all tracks in the SDP)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All tracks of the stream
    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    /// Tracks of one kind
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<LocalTrack>> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Stop every track. Idempotent.
    pub(crate) fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// The remote peer's track set.
///
/// Replaced wholesale (never mutated in place by consumers) whenever a
/// fresh native stream id arrives, so presentation layers cannot hold
/// stale track references across a renegotiation.
#[derive(Clone)]
pub struct RemoteMediaStream {
    id: String,
    tracks: Vec<Arc<TrackRemote>>,
}

impl RemoteMediaStream {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            tracks: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, track: Arc<TrackRemote>) {
        self.tracks.push(track);
    }

    /// Native stream identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tracks received so far for this stream
    pub fn tracks(&self) -> &[Arc<TrackRemote>] {
        &self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_starts_enabled() {
        let track = LocalTrack::new(TrackKind::Audio, "stream-1");
        assert!(track.is_enabled());
        assert!(!track.is_stopped());
    }

    #[test]
    fn test_toggle_flag_round_trip() {
        let track = LocalTrack::new(TrackKind::Audio, "stream-1");

        track.set_enabled(false);
        assert!(!track.is_enabled());
        track.set_enabled(true);
        assert!(track.is_enabled());
    }

    #[test]
    fn test_stop_is_permanent_and_idempotent() {
        let track = LocalTrack::new(TrackKind::Video, "stream-1");
        track.stop();
        track.stop();
        assert!(track.is_stopped());
    }

    #[tokio::test]
    async fn test_disabled_track_drops_samples() {
        let track = LocalTrack::new(TrackKind::Audio, "stream-1");
        track.set_enabled(false);

        let sample = Sample {
            data: vec![0u8; 4].into(),
            duration: std::time::Duration::from_millis(20),
            ..Default::default()
        };
        assert!(track.write_sample(&sample).await.is_ok());
    }

    #[test]
    fn test_stream_filters_by_kind() {
        let stream = LocalMediaStream::new(
            "stream-1".to_string(),
            vec![
                Arc::new(LocalTrack::new(TrackKind::Audio, "stream-1")),
                Arc::new(LocalTrack::new(TrackKind::Video, "stream-1")),
            ],
        );

        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.tracks_of(TrackKind::Audio).count(), 1);
        assert_eq!(stream.tracks_of(TrackKind::Video).count(), 1);
    }
}
