//! `Transport` implementations.

mod channel;
mod valkey;

pub use channel::{ChannelTransport, Outbound, TransportHandle, channel_transport};
pub use valkey::ValkeyTransport;
