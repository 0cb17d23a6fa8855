//! Roomsync Server
//!
//! A room-scoped relay for collaborative text editing plus a WebRTC
//! signaling relay.
//!
//! ## Features
//!
//! - **Document sync**: binary Y-sync over WebSocket at `/yjs?room=...` or
//!   `/yjs/{room}`, with the server holding one authoritative replica per room
//! - **Presence**: per-room cursor and user state relayed alongside edits
//! - **Signaling**: JSON relay at `/signal` for peer-to-peer call setup
//!
//! Nothing is persisted; a room lives in memory until it has been empty for
//! the eviction grace period.
//!
//! ## Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3000)
//! - `DEFAULT_ROOM`: Room used when none is named (default: default)
//! - `ROOM_EVICT_AFTER_SECS`: Empty-room grace period (default: 300)
//! - `ROOM_SWEEP_INTERVAL_SECS`: Eviction sweep period (default: 60)
//! - `PING_INTERVAL_SECS`: Keepalive ping period (default: 15)
//! - `IDLE_TIMEOUT_SECS`: Close sockets silent for this long (default: 45)
//! - `OUTBOUND_BUFFER`: Per-connection outbound queue length (default: 256)

pub mod config;
pub mod handlers;
pub mod signaling;
pub mod sync;

pub use config::Config;
