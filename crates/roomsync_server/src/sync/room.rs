use axum::body::Bytes;
use roomsync_core::ConnectionId;
use roomsync_core::crdt::{Message, PresenceTracker, PresenceUpdate, SyncEngine, SyncMessage};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use super::broadcast::BroadcastGroup;

/// Statistics for one room
#[derive(Debug, Clone, Default)]
pub struct RoomStats {
    pub members: usize,
    pub presence_entries: usize,
}

/// Everything mutable about a room, guarded by one lock so that every event
/// in the room, and the fan-out it causes, is totally ordered.
struct RoomInner {
    engine: SyncEngine,
    presence: PresenceTracker,
    members: BroadcastGroup<Bytes>,
    /// Set while the room has no members
    empty_since: Option<Instant>,
}

/// A sync room: one shared document, its presence table and its members.
pub struct SyncRoom {
    room_id: String,
    inner: Mutex<RoomInner>,
}

impl SyncRoom {
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            inner: Mutex::new(RoomInner {
                engine: SyncEngine::new(),
                presence: PresenceTracker::new(),
                members: BroadcastGroup::new(),
                empty_since: Some(Instant::now()),
            }),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Register a member and queue its greeting: the SyncStep1 handshake,
    /// then the current presence snapshot.
    ///
    /// Both frames are queued under the room lock, so nothing broadcast
    /// afterwards can overtake them. Returns the member count.
    pub async fn join(&self, id: ConnectionId, tx: mpsc::Sender<Bytes>) -> usize {
        let mut inner = self.inner.lock().await;

        let handshake = Bytes::from(inner.engine.handshake());
        let snapshot = Bytes::from(Message::Presence(inner.presence.snapshot()).encode());

        if !inner.members.add_peer(id, tx) {
            debug!("Connection {} already joined room {}", id, self.room_id);
            return inner.members.len();
        }
        inner.empty_since = None;
        inner.members.send_to(&id, handshake);
        inner.members.send_to(&id, snapshot);

        let members = inner.members.len();
        info!(
            "Connection {} joined room {} ({} members)",
            id, self.room_id, members
        );
        members
    }

    /// Apply sync sub-messages from `sender`.
    ///
    /// Replies go to the sender's own queue; accepted updates go to everyone
    /// else. Returns true once the sender's state vector has been answered.
    pub async fn apply_sync(&self, sender: ConnectionId, messages: Vec<SyncMessage>) -> bool {
        let inner = self.inner.lock().await;
        if !inner.members.contains(&sender) {
            debug!("Ignoring sync from non-member {}", sender);
            return false;
        }

        let outcome = inner.engine.handle(messages);
        for reply in outcome.replies {
            inner.members.send_to(&sender, Bytes::from(reply));
        }
        for update in outcome.broadcasts {
            let delivered = inner.members.fanout(&sender, &Bytes::from(update));
            debug!(
                "Room {}: update from {} delivered to {} peers",
                self.room_id, sender, delivered
            );
        }
        outcome.reconciled
    }

    /// Apply a presence update from `sender` and forward the accepted part.
    pub async fn apply_presence(&self, sender: ConnectionId, update: &PresenceUpdate) -> usize {
        let mut inner = self.inner.lock().await;
        if !inner.members.contains(&sender) {
            debug!("Ignoring presence from non-member {}", sender);
            return 0;
        }

        let accepted = inner.presence.apply(sender, update);
        if accepted.is_empty() {
            return 0;
        }
        let count = accepted.entries.len();
        let frame = Bytes::from(Message::Presence(accepted).encode());
        inner.members.fanout(&sender, &frame);
        count
    }

    /// Queue the full presence table for `target`.
    pub async fn send_presence_snapshot(&self, target: ConnectionId) -> bool {
        let inner = self.inner.lock().await;
        let frame = Bytes::from(Message::Presence(inner.presence.snapshot()).encode());
        inner.members.send_to(&target, frame)
    }

    /// Remove a member, drop its presence and tell the others.
    ///
    /// Returns false if `id` was not a member, in which case nothing is sent.
    pub async fn leave(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.members.remove_peer(&id) {
            return false;
        }

        let notice = inner.presence.remove_all(&[id]);
        if !notice.is_empty() {
            let frame = Bytes::from(Message::Presence(notice).encode());
            inner.members.broadcast(&frame);
        }

        if inner.members.is_empty() {
            inner.empty_since = Some(Instant::now());
        }
        info!(
            "Connection {} left room {} ({} members)",
            id,
            self.room_id,
            inner.members.len()
        );
        true
    }

    /// True when the room has had no members for at least `grace`.
    pub async fn is_idle(&self, grace: Duration) -> bool {
        let inner = self.inner.lock().await;
        inner
            .empty_since
            .is_some_and(|since| inner.members.is_empty() && since.elapsed() >= grace)
    }

    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn is_member(&self, id: &ConnectionId) -> bool {
        self.inner.lock().await.members.contains(id)
    }

    /// Current document text (for debugging/inspection)
    pub async fn content(&self) -> String {
        self.inner.lock().await.engine.replica().content()
    }

    pub async fn stats(&self) -> RoomStats {
        let inner = self.inner.lock().await;
        RoomStats {
            members: inner.members.len(),
            presence_entries: inner.presence.len(),
        }
    }
}

impl std::fmt::Debug for SyncRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRoom")
            .field("room_id", &self.room_id)
            .finish_non_exhaustive()
    }
}
