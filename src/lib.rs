//! Peer-to-peer audio/video session core for live interviews
//!
//! This crate establishes a bidirectional audio/video session between an
//! interviewer and a candidate over WebRTC, with an auxiliary
//! low-latency data channel for structured messages (live scores and
//! similar). It owns the hard part — peer-connection negotiation under
//! asynchronous, unordered signaling delivery — and exposes a single
//! read model for presentation layers.
//!
//! # Features
//!
//! - **Offer/answer negotiation**: caller and callee flows driven by one
//!   orchestrator per session
//! - **Trickle ICE**: candidates flow as they are discovered; early
//!   arrivals are buffered until the matching description is set
//! - **Connection health**: a canonical state machine projected from
//!   native transport events, with transient-disconnect recovery and a
//!   single automatic ICE restart after failure
//! - **Mute/unmute without renegotiation**: disabled tracks drop samples
//!   while their senders stay attached
//! - **Auxiliary data channel**: best-effort structured messaging
//!   multiplexed over the peer connection
//! - **Pluggable collaborators**: signaling transports and capture
//!   backends are trait seams
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  UI commands (join/leave/toggle/send)                   │
//! │  ↓                                                      │
//! │  SessionOrchestrator                                    │
//! │  ├─ MediaCaptureManager (local tracks via MediaDevices) │
//! │  ├─ PeerConnectionCore (native connection, candidate    │
//! │  │   buffering, data channel)                           │
//! │  ├─ ConnectionStateMachine (canonical status)           │
//! │  └─ SignalingTransport (external service adapter)       │
//! │  ↓                                                      │
//! │  SessionViewState snapshot → UI re-render               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use interview_rtc::{
//!     MemorySignaling, Role, SessionConfig, SessionOrchestrator, SyntheticDevices,
//! };
//!
//! # async fn example() -> interview_rtc::Result<()> {
//! let signaling = Arc::new(MemorySignaling::new());
//! let session = SessionOrchestrator::new(
//!     "interview-42",
//!     SessionConfig::default(),
//!     signaling,
//!     Arc::new(SyntheticDevices::new()),
//! )?;
//!
//! let _local_stream = session.join(Role::Interviewer, "Avery").await?;
//!
//! // Render from the read model; re-render on change notifications.
//! let mut state = session.watch();
//! state.changed().await.ok();
//! println!("connection: {:?}", state.borrow().connection);
//!
//! session.leave().await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

// Public modules
pub mod channels;
pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

// Re-exports for the public API
pub use channels::{AuxMessage, MAX_AUX_MESSAGE_SIZE};
pub use config::{DataChannelMode, SessionConfig, TurnServerConfig};
pub use error::{Error, Result};
pub use media::{
    LocalMediaStream, MediaCaptureManager, MediaConstraints, MediaDevices, RemoteMediaStream,
    SyntheticDevices, TrackKind,
};
pub use peer::{ConnectionState, ConnectionStateMachine, PeerConnectionCore, TransportSignal};
pub use session::{EndReason, Participant, Role, SessionOrchestrator, SessionViewState};
pub use signaling::{
    MemorySignaling, SignalingMessage, SignalingPayload, SignalingTransport, WebSocketSignaling,
};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
