use axum::body::Bytes;
use roomsync_core::ConnectionId;
use roomsync_core::crdt::{Message, PresenceUpdate, SyncMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{RoomRegistry, SyncRoom};

/// Lifecycle of one document-channel connection.
///
/// ```text
/// Connecting → Joined → Reconciling → Active → Closed
/// ```
///
/// `Joined` is entered when membership is registered; queuing the handshake
/// moves the connection to `Reconciling`, and answering the peer's state
/// vector moves it to `Active`. Updates are accepted in both of the last two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Joined,
    Reconciling,
    Active,
    Closed,
}

/// Represents a connected client
pub struct ClientConnection {
    id: ConnectionId,
    room: Arc<SyncRoom>,
    state: ConnectionState,
}

impl ClientConnection {
    /// Resolve the room, register membership and queue the greeting.
    ///
    /// `tx` is the connection's outbound queue; everything the server sends
    /// to this connection goes through it.
    pub async fn join(
        registry: &RoomRegistry,
        room_id: Option<&str>,
        tx: mpsc::Sender<Bytes>,
    ) -> Self {
        let room = registry.get_or_create(room_id).await;
        let mut connection = Self {
            id: ConnectionId::new(),
            room,
            state: ConnectionState::Connecting,
        };

        connection.room.join(connection.id, tx).await;
        connection.transition(ConnectionState::Joined);
        // The room queued SyncStep1 and the presence snapshot during join
        connection.transition(ConnectionState::Reconciling);
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn room(&self) -> &Arc<SyncRoom> {
        &self.room
    }

    /// Decode one inbound frame and dispatch it by message type.
    ///
    /// Malformed frames are logged and dropped; the connection stays open.
    pub async fn handle_frame(&mut self, frame: &[u8]) {
        if !matches!(
            self.state,
            ConnectionState::Reconciling | ConnectionState::Active
        ) {
            debug!(
                "Ignoring frame for connection {} in state {:?}",
                self.id, self.state
            );
            return;
        }

        let message = match Message::decode(frame) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "Dropping malformed frame from {} in room {}: {}",
                    self.id,
                    self.room.room_id(),
                    e
                );
                return;
            }
        };

        match message {
            Message::Sync(messages) => self.on_sync(messages).await,
            Message::Presence(update) => self.on_presence(update).await,
            Message::QueryPresence => self.on_query_presence().await,
        }
    }

    async fn on_sync(&mut self, messages: Vec<SyncMessage>) {
        let reconciled = self.room.apply_sync(self.id, messages).await;
        if reconciled && self.state == ConnectionState::Reconciling {
            self.transition(ConnectionState::Active);
        }
    }

    async fn on_presence(&mut self, update: PresenceUpdate) {
        let accepted = self.room.apply_presence(self.id, &update).await;
        if accepted < update.entries.len() {
            debug!(
                "Connection {}: {} of {} presence entries were stale",
                self.id,
                update.entries.len() - accepted,
                update.entries.len()
            );
        }
    }

    async fn on_query_presence(&mut self) {
        self.room.send_presence_snapshot(self.id).await;
    }

    /// Leave the room and drop presence. Returns false if already closed.
    pub async fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.room.leave(self.id).await;
        self.transition(ConnectionState::Closed);
        true
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("Connection {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        // Handler ended without close(), e.g. it panicked: clean up on the runtime
        let room = self.room.clone();
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    room.leave(id).await;
                });
            }
            Err(_) => warn!("Connection {} dropped outside a runtime; membership leaked", id),
        }
    }
}
