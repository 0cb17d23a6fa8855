use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use super::SyncRoom;

/// Statistics about the sync state
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub active_connections: usize,
    pub active_rooms: usize,
}

/// Registry of all document rooms.
///
/// Rooms are created on first reference. A room is evicted once it has been
/// empty for the configured grace period and no connection handler still
/// holds it; see [`RoomRegistry::evict_idle`].
pub struct RoomRegistry {
    /// Map of room_id to SyncRoom
    rooms: RwLock<HashMap<String, Arc<SyncRoom>>>,
    default_room: String,
}

impl RoomRegistry {
    pub fn new(default_room: impl Into<String>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            default_room: default_room.into(),
        }
    }

    /// Map an absent or blank room id to the default room.
    pub fn normalize(&self, room_id: Option<&str>) -> String {
        match room_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.default_room.clone(),
        }
    }

    /// Get or create the room for `room_id`. Never fails.
    pub async fn get_or_create(&self, room_id: Option<&str>) -> Arc<SyncRoom> {
        let room_id = self.normalize(room_id);

        // Check if room exists
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(&room_id) {
                return room.clone();
            }
        }

        let mut rooms = self.rooms.write().await;

        // Double-check after acquiring write lock
        if let Some(room) = rooms.get(&room_id) {
            return room.clone();
        }

        let room = Arc::new(SyncRoom::new(&room_id));
        rooms.insert(room_id.clone(), room.clone());
        info!("Created sync room: {}", room_id);

        room
    }

    /// Get an existing room (does not create if not found)
    pub async fn get(&self, room_id: &str) -> Option<Arc<SyncRoom>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// Evict rooms that have been empty for at least `grace`.
    ///
    /// A room still referenced outside the registry (a handler between lookup
    /// and join, for instance) is kept. Returns the number of evicted rooms.
    pub async fn evict_idle(&self, grace: Duration) -> usize {
        let mut rooms = self.rooms.write().await;

        let mut evict = Vec::new();
        for (room_id, room) in rooms.iter() {
            if Arc::strong_count(room) == 1 && room.is_idle(grace).await {
                evict.push(room_id.clone());
            }
        }

        for room_id in &evict {
            rooms.remove(room_id);
            info!("Evicted idle sync room: {}", room_id);
        }
        evict.len()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Get statistics about the sync state
    pub async fn stats(&self) -> SyncStats {
        let rooms: Vec<Arc<SyncRoom>> = self.rooms.read().await.values().cloned().collect();

        let mut active_connections = 0;
        for room in &rooms {
            active_connections += room.member_count().await;
        }

        SyncStats {
            active_connections,
            active_rooms: rooms.len(),
        }
    }
}
