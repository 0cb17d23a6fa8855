use thiserror::Error;

/// Errors raised while decoding frames or merging document state.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Empty message")]
    Empty,

    #[error("Message truncated while reading {0}")]
    Truncated(&'static str),

    #[error("Variable-length integer overflows 64 bits")]
    VarUintOverflow,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),

    #[error("Unknown sync type: {0}")]
    UnknownSyncType(u64),

    #[error("Sync message carries no sub-messages")]
    EmptySync,

    #[error("Unexpected bytes after {0}")]
    TrailingBytes(&'static str),

    #[error("Presence state is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("CRDT error: {0}")]
    Crdt(String),
}

/// Result type alias for roomsync operations
pub type Result<T> = std::result::Result<T, SyncError>;
