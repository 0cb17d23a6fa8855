use roomsync_core::ConnectionId;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use super::ServerSignal;
use crate::sync::BroadcastGroup;

/// Statistics about the signaling state
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignalStats {
    pub signal_rooms: usize,
    pub signal_connections: usize,
}

#[derive(Default)]
struct HubInner {
    rooms: HashMap<String, BroadcastGroup<ServerSignal>>,
    /// Which room each connection is in
    membership: HashMap<ConnectionId, String>,
}

impl HubInner {
    fn remove(&mut self, id: &ConnectionId) -> Option<String> {
        let room_id = self.membership.remove(id)?;
        if let Some(group) = self.rooms.get_mut(&room_id) {
            group.remove_peer(id);
            if group.is_empty() {
                self.rooms.remove(&room_id);
            } else {
                group.broadcast(&ServerSignal::PeerLeft { id: *id });
            }
        }
        Some(room_id)
    }
}

/// Room-scoped relay of opaque connection-setup payloads.
///
/// Signaling rooms hold nothing but membership, so an empty one is dropped
/// as soon as its last member leaves.
pub struct SignalHub {
    inner: Mutex<HubInner>,
    default_room: String,
}

impl SignalHub {
    pub fn new(default_room: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
            default_room: default_room.into(),
        }
    }

    /// Put `id` in a signaling room and announce it to the members already there.
    ///
    /// A connection already in another room leaves it first. Returns the
    /// normalized room id.
    pub async fn join(
        &self,
        id: ConnectionId,
        room: Option<&str>,
        tx: mpsc::Sender<ServerSignal>,
    ) -> String {
        let room_id = match room.map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => self.default_room.clone(),
        };

        let mut inner = self.inner.lock().await;
        if inner.membership.get(&id) == Some(&room_id) {
            return room_id;
        }
        inner.remove(&id);

        let group = inner.rooms.entry(room_id.clone()).or_default();
        group.fanout(&id, &ServerSignal::PeerJoined { id });
        group.add_peer(id, tx);
        let members = group.len();
        inner.membership.insert(id, room_id.clone());

        info!(
            "Signaling connection {} joined room {} ({} members)",
            id, room_id, members
        );
        room_id
    }

    /// Forward `signal` from `from` to `to`.
    ///
    /// `to` must be in the same room as `from`. Anything else is dropped
    /// without telling the sender. Returns whether the payload was queued.
    pub async fn relay(&self, from: ConnectionId, to: ConnectionId, signal: serde_json::Value) -> bool {
        let inner = self.inner.lock().await;
        let Some(group) = inner
            .membership
            .get(&from)
            .and_then(|room_id| inner.rooms.get(room_id))
        else {
            debug!("Dropping signal from {}: not in a room", from);
            return false;
        };

        if !group.contains(&to) || to == from {
            debug!("Dropping signal from {}: target {} not in room", from, to);
            return false;
        }
        group.send_to(&to, ServerSignal::Signal { from, signal })
    }

    /// Remove `id` from its room and tell the rest. Idempotent.
    pub async fn leave(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.remove(&id) {
            Some(room_id) => {
                info!("Signaling connection {} left room {}", id, room_id);
                true
            }
            None => false,
        }
    }

    pub async fn room_of(&self, id: &ConnectionId) -> Option<String> {
        self.inner.lock().await.membership.get(id).cloned()
    }

    pub async fn stats(&self) -> SignalStats {
        let inner = self.inner.lock().await;
        SignalStats {
            signal_rooms: inner.rooms.len(),
            signal_connections: inner.membership.len(),
        }
    }
}
