//! Canonical connection state derived from native transport events

use serde::{Deserialize, Serialize};
use tracing::debug;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Canonical connection status of a session.
///
/// Owned exclusively by [`ConnectionStateMachine`] and mutated only by
/// native transport callbacks, never by UI code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No negotiation has started
    New,
    /// Negotiation/connectivity checks in progress
    Connecting,
    /// Media is flowing over a verified network path
    Connected,
    /// Transient connectivity loss; recovery is possible
    Disconnected,
    /// The current negotiation failed; terminal until restarted
    Failed,
    /// The session object is closed; irreversible
    Closed,
}

impl ConnectionState {
    /// Whether no further transitions are possible without a fresh
    /// negotiation
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }
}

/// Native transport event feeding the state machine.
///
/// The crate's projection of `RTCPeerConnectionState`, plus the ICE
/// `Completed` signal which only arrives on the ICE state callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSignal {
    /// Connection object created
    New,
    /// Connectivity checks started
    Connecting,
    /// A transport pair was verified
    Connected,
    /// ICE finished checking all candidate pairs
    Completed,
    /// Connectivity was lost
    Disconnected,
    /// All candidate pairs failed
    Failed,
    /// The connection was closed
    Closed,
}

impl TransportSignal {
    /// Map a native peer-connection state change to a signal.
    ///
    /// `Unspecified` carries no information and is dropped.
    pub fn from_peer_state(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::New => Some(TransportSignal::New),
            RTCPeerConnectionState::Connecting => Some(TransportSignal::Connecting),
            RTCPeerConnectionState::Connected => Some(TransportSignal::Connected),
            RTCPeerConnectionState::Disconnected => Some(TransportSignal::Disconnected),
            RTCPeerConnectionState::Failed => Some(TransportSignal::Failed),
            RTCPeerConnectionState::Closed => Some(TransportSignal::Closed),
            RTCPeerConnectionState::Unspecified => None,
        }
    }

    /// Map a native ICE connection state change to a signal.
    ///
    /// Only `Completed` is forwarded; every other ICE state is already
    /// reflected in the peer-connection state callback.
    pub fn from_ice_state(state: RTCIceConnectionState) -> Option<Self> {
        match state {
            RTCIceConnectionState::Completed => Some(TransportSignal::Completed),
            _ => None,
        }
    }
}

/// Pure projection of transport signals onto [`ConnectionState`].
///
/// Transitions: `New → Connecting → {Connected ↔ Disconnected} →
/// Failed | Closed`. `Disconnected` is transient — a later `Connected`
/// signal (ICE restart recovery) moves back without external
/// intervention. `Failed` accepts only `Closed`; `Closed` accepts
/// nothing.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// Create a machine in `New`
    pub fn new() -> Self {
        Self {
            state: ConnectionState::New,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Apply a native signal.
    ///
    /// Returns the new state when the signal causes a transition, `None`
    /// when it is absorbed (duplicate, or blocked by a terminal state).
    pub fn apply(&mut self, signal: TransportSignal) -> Option<ConnectionState> {
        let current = self.state;

        let next = match (current, signal) {
            (ConnectionState::Closed, _) => return None,
            (ConnectionState::Failed, TransportSignal::Closed) => ConnectionState::Closed,
            (ConnectionState::Failed, _) => return None,
            // The native object reports New before negotiation starts;
            // it is never a transition target afterwards.
            (_, TransportSignal::New) => return None,
            (_, TransportSignal::Connecting) => ConnectionState::Connecting,
            (_, TransportSignal::Connected | TransportSignal::Completed) => {
                ConnectionState::Connected
            }
            (_, TransportSignal::Disconnected) => ConnectionState::Disconnected,
            (_, TransportSignal::Failed) => ConnectionState::Failed,
            (_, TransportSignal::Closed) => ConnectionState::Closed,
        };

        if next == current {
            return None;
        }

        debug!(from = ?current, to = ?next, "connection state transition");
        self.state = next;
        Some(next)
    }
}
