//! Server-pushed events over a reconnecting WebSocket.

pub mod channel;

pub use channel::{EventChannel, EventChannelConfig};
