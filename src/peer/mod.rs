//! Peer connection ownership and connection-state projection

mod connection;
mod state;

pub use connection::PeerConnectionCore;
pub use state::{ConnectionState, ConnectionStateMachine, TransportSignal};
