//! WebRTC signaling relay.
//!
//! Payloads are forwarded between two connections of the same signaling room
//! and never inspected; the media connection itself is peer-to-peer.

mod hub;
mod messages;

pub use hub::{SignalHub, SignalStats};
pub use messages::{ClientSignal, ServerSignal};
