//! Local media acquisition

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::tracks::{LocalMediaStream, LocalTrack, TrackKind};
use crate::{Error, Result};

/// Which media kinds to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Capture microphone audio
    pub audio: bool,
    /// Capture camera video
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

impl MediaConstraints {
    /// Audio-only constraints
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }

    /// True when no media kind is requested
    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

/// Capture device backend.
///
/// Claims the devices satisfying the constraints and returns one local
/// track per requested kind. Failures map to
/// [`Error::PermissionDenied`] when the user or platform refuses access
/// and [`Error::DeviceUnavailable`] when hardware is missing or already
/// claimed.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open capture devices and produce the local tracks for `stream_id`
    async fn open(
        &self,
        constraints: &MediaConstraints,
        stream_id: &str,
    ) -> Result<Vec<Arc<LocalTrack>>>;
}

/// Backend that claims no hardware.
///
/// Produces sample-fed tracks; the application pushes real frames via
/// [`LocalTrack::write_sample`]. Used by tests, loopback runs and hosts
/// that do their own capture.
#[derive(Debug, Default)]
pub struct SyntheticDevices;

impl SyntheticDevices {
    /// Create a synthetic backend
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn open(
        &self,
        constraints: &MediaConstraints,
        stream_id: &str,
    ) -> Result<Vec<Arc<LocalTrack>>> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(LocalTrack::new(TrackKind::Audio, stream_id)));
        }
        if constraints.video {
            tracks.push(Arc::new(LocalTrack::new(TrackKind::Video, stream_id)));
        }

        debug!(stream_id, count = tracks.len(), "synthetic tracks opened");
        Ok(tracks)
    }
}

/// Acquires and releases the local capture tracks for one session
pub struct MediaCaptureManager {
    devices: Arc<dyn MediaDevices>,
    stream: RwLock<Option<Arc<LocalMediaStream>>>,
}

impl MediaCaptureManager {
    /// Create a manager over the given capture backend
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            stream: RwLock::new(None),
        }
    }

    /// Acquire camera/microphone tracks per the constraints.
    ///
    /// Fails with `PermissionDenied` or `DeviceUnavailable` from the
    /// backend; acquiring while a stream is already held is an
    /// `InvalidState` error.
    pub async fn acquire(&self, constraints: &MediaConstraints) -> Result<Arc<LocalMediaStream>> {
        if constraints.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one media kind must be requested".to_string(),
            ));
        }

        let mut slot = self.stream.write().await;
        if slot.is_some() {
            return Err(Error::InvalidState(
                "local media already acquired".to_string(),
            ));
        }

        let stream_id = format!("stream-{}", uuid::Uuid::new_v4());
        let tracks = self.devices.open(constraints, &stream_id).await?;
        let stream = Arc::new(LocalMediaStream::new(stream_id, tracks));

        info!(
            stream_id = stream.id(),
            tracks = stream.tracks().len(),
            "local media acquired"
        );

        *slot = Some(Arc::clone(&stream));
        Ok(stream)
    }

    /// Set the enabled flag on all tracks of one kind.
    ///
    /// The tracks stay attached to the connection, so no renegotiation
    /// occurs. Returns the resulting enabled state.
    pub async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> Result<bool> {
        let guard = self.stream.read().await;
        let stream = guard
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no local media acquired".to_string()))?;

        let mut found = false;
        for track in stream.tracks_of(kind) {
            track.set_enabled(enabled);
            found = true;
        }

        if !found {
            return Err(Error::InvalidState(format!(
                "no {} tracks acquired",
                kind
            )));
        }

        Ok(enabled)
    }

    /// Flip the enabled flag of one kind and return the new state
    pub async fn toggle(&self, kind: TrackKind) -> Result<bool> {
        let current = self
            .is_enabled(kind)
            .await
            .ok_or_else(|| Error::InvalidState("no local media acquired".to_string()))?;
        self.set_track_enabled(kind, !current).await
    }

    /// Current enabled state of one kind, if such a track exists
    pub async fn is_enabled(&self, kind: TrackKind) -> Option<bool> {
        let guard = self.stream.read().await;
        guard
            .as_ref()
            .and_then(|s| s.tracks_of(kind).next().map(|t| t.is_enabled()))
    }

    /// The currently held stream, if any
    pub async fn stream(&self) -> Option<Arc<LocalMediaStream>> {
        self.stream.read().await.clone()
    }

    /// Stop and drop every local track. Idempotent; safe to call
    /// repeatedly.
    pub async fn release(&self) {
        if let Some(stream) = self.stream.write().await.take() {
            stream.stop_all();
            info!(stream_id = stream.id(), "local media released");
        }
    }
}
