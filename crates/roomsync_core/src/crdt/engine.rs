//! Y-sync handshake and update handling for one room document.
//!
//! # Protocol Overview
//!
//! 1. When a connection joins, the server sends **SyncStep1** with its own
//!    state vector so the peer can push anything the server lacks.
//! 2. The peer sends its own **SyncStep1**; the server answers with
//!    **SyncStep2** holding exactly the edits missing from that state vector.
//!    An empty document's state vector yields the full state.
//! 3. After that, **Update** messages flow both ways. A peer's SyncStep2 is
//!    treated the same as an Update.
//!
//! Every accepted change is re-framed as an Update for the other peers.
//! Updates that do not change the document are never forwarded.

use super::protocol::SyncMessage;
use super::replica::DocumentReplica;

/// Result of handling one batch of sync sub-messages from a peer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Frames to send back to the peer
    pub replies: Vec<Vec<u8>>,
    /// Update frames to fan out to the rest of the room
    pub broadcasts: Vec<Vec<u8>>,
    /// The peer's state vector was answered with a diff
    pub reconciled: bool,
}

/// Sync protocol handler owning a room's document.
#[derive(Debug, Default)]
pub struct SyncEngine {
    replica: DocumentReplica,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replica(&self) -> &DocumentReplica {
        &self.replica
    }

    /// SyncStep1 frame sent to a connection right after it joins.
    pub fn handshake(&self) -> Vec<u8> {
        SyncMessage::SyncStep1(self.replica.encode_state_vector()).encode()
    }

    /// Handle the sub-messages of one Sync frame.
    ///
    /// Sub-messages that fail to decode or merge are logged and skipped; the
    /// rest of the batch is still processed.
    pub fn handle(&self, messages: Vec<SyncMessage>) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        for msg in messages {
            match msg {
                SyncMessage::SyncStep1(state_vector) => {
                    match self.replica.encode_diff(&state_vector) {
                        Ok(diff) => {
                            log::debug!(
                                "[Y-sync] Answering SyncStep1 with {} byte diff",
                                diff.len()
                            );
                            outcome.replies.push(SyncMessage::SyncStep2(diff).encode());
                            outcome.reconciled = true;
                        }
                        Err(e) => log::warn!("Dropping SyncStep1: {}", e),
                    }
                }
                SyncMessage::SyncStep2(update) | SyncMessage::Update(update) => {
                    if update.is_empty() {
                        continue;
                    }
                    match self.replica.apply_update(&update) {
                        Ok(true) => {
                            outcome
                                .broadcasts
                                .push(SyncMessage::Update(update).encode());
                        }
                        Ok(false) => {
                            log::debug!("[Y-sync] Update of {} bytes changed nothing", update.len());
                        }
                        Err(e) => log::warn!("Dropping update: {}", e),
                    }
                }
            }
        }

        outcome
    }
}
