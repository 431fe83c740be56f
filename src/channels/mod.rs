//! Auxiliary data channel support
//!
//! The session multiplexes a low-latency data channel over the peer
//! connection for structured non-media messages (live scores and
//! similar). Delivery is best-effort: sends while the channel is not
//! open are dropped with a warning, never errors.

mod data_channel;
mod messages;

pub use data_channel::{DataChannel, DataChannelState};
pub use messages::{AuxMessage, MAX_AUX_MESSAGE_SIZE};

pub(crate) use data_channel::ChannelEvents;
