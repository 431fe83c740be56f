//! Local media acquisition and track management
//!
//! Capture backends are injectable through the [`MediaDevices`] trait;
//! the crate ships [`SyntheticDevices`], a no-hardware backend whose
//! tracks are fed by the application via [`LocalTrack::write_sample`].

mod capture;
mod tracks;

pub use capture::{MediaCaptureManager, MediaConstraints, MediaDevices, SyntheticDevices};
pub use tracks::{LocalMediaStream, LocalTrack, RemoteMediaStream, TrackKind};
