use roomsync_core::ConnectionId;
use serde::{Deserialize, Serialize};

/// Messages sent from a client on the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientSignal {
    /// Enter a signaling room, leaving the current one if any
    JoinRoom {
        #[serde(default)]
        room: Option<String>,
    },
    /// Forward `signal` to connection `to` in the same room
    Signal {
        to: ConnectionId,
        signal: serde_json::Value,
    },
}

/// Messages sent from the server on the signaling channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerSignal {
    /// First message on every connection, carrying its id
    Welcome { id: ConnectionId },
    PeerJoined { id: ConnectionId },
    PeerLeft { id: ConnectionId },
    Signal {
        from: ConnectionId,
        signal: serde_json::Value,
    },
}
