//! Core library for roomsync.
//!
//! Everything a room needs that does not touch the network lives here:
//!
//! - [`crdt::DocumentReplica`]: the yrs-backed text document of a room
//! - [`crdt::SyncEngine`]: the Y-sync step1/step2/update handshake
//! - [`crdt::PresenceTracker`]: per-connection presence with clock-based staleness checks
//! - [`crdt::Message`]: the binary envelope exchanged on the document channel
//!
//! The server crate wires these into sockets; tests can drive them directly.

pub mod crdt;
pub mod error;
pub mod types;

pub use error::{Result, SyncError};
pub use types::ConnectionId;
