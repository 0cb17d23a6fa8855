//! CRDT document state, presence and the Y-sync wire protocol.

mod encoding;
mod engine;
mod presence;
mod protocol;
mod replica;

pub use engine::{SyncEngine, SyncOutcome};
pub use presence::{PresenceEntry, PresenceState, PresenceTracker, PresenceUpdate};
pub use protocol::{Message, SyncMessage};
pub use replica::{DocumentReplica, TEXT_NAME};
