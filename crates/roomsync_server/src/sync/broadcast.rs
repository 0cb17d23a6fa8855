//! Fan-out to the members of one room.
//!
//! Each member owns a bounded outbound queue drained by its socket task.
//! Delivery never waits: a full or closed queue loses that one message for
//! that one peer, and the document handshake repairs the gap on reconnect.

use indexmap::IndexMap;
use roomsync_core::ConnectionId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Members of a room and their outbound queues, in join order.
#[derive(Debug)]
pub struct BroadcastGroup<T> {
    peers: IndexMap<ConnectionId, mpsc::Sender<T>>,
}

impl<T: Clone> BroadcastGroup<T> {
    pub fn new() -> Self {
        Self {
            peers: IndexMap::new(),
        }
    }

    /// Register a member. Returns false if it was already present.
    pub fn add_peer(&mut self, id: ConnectionId, tx: mpsc::Sender<T>) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(id, tx);
        true
    }

    /// Unregister a member. Returns false if it was not present.
    pub fn remove_peer(&mut self, id: &ConnectionId) -> bool {
        self.peers.shift_remove(id).is_some()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Deliver to every member except `sender`. Returns how many queues took it.
    pub fn fanout(&self, sender: &ConnectionId, msg: &T) -> usize {
        self.peers
            .iter()
            .filter(|(id, _)| *id != sender)
            .filter(|(id, tx)| deliver(id, tx, msg.clone()))
            .count()
    }

    /// Deliver to every member.
    pub fn broadcast(&self, msg: &T) -> usize {
        self.peers
            .iter()
            .filter(|(id, tx)| deliver(id, tx, msg.clone()))
            .count()
    }

    /// Deliver to one member. Returns false if it is unknown or its queue refused.
    pub fn send_to(&self, target: &ConnectionId, msg: T) -> bool {
        match self.peers.get(target) {
            Some(tx) => deliver(target, tx, msg),
            None => false,
        }
    }
}

impl<T: Clone> Default for BroadcastGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver<T>(id: &ConnectionId, tx: &mpsc::Sender<T>, msg: T) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("Outbound queue full for {}, dropping message", id);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Outbound queue closed for {}, skipping", id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fanout_skips_sender() {
        let mut group = BroadcastGroup::new();
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        group.add_peer(a, tx_a);
        group.add_peer(b, tx_b);

        assert_eq!(group.fanout(&a, &"update"), 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "update");
    }

    #[test]
    fn test_fanout_preserves_order() {
        let mut group = BroadcastGroup::new();
        let sender = ConnectionId::new();
        let (tx, mut rx) = mpsc::channel(8);
        group.add_peer(ConnectionId::new(), tx);

        for n in 0..5 {
            group.fanout(&sender, &n);
        }
        let received: Vec<i32> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_full_or_closed_peer_does_not_block_others() {
        let mut group = BroadcastGroup::new();
        let sender = ConnectionId::new();

        let (full_tx, _full_rx) = mpsc::channel(1);
        full_tx.try_send(0).unwrap();
        let (closed_tx, closed_rx) = mpsc::channel(1);
        drop(closed_rx);
        let (ok_tx, mut ok_rx) = mpsc::channel(1);

        group.add_peer(ConnectionId::new(), full_tx);
        group.add_peer(ConnectionId::new(), closed_tx);
        group.add_peer(ConnectionId::new(), ok_tx);

        assert_eq!(group.fanout(&sender, &7), 1);
        assert_eq!(ok_rx.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_membership() {
        let mut group: BroadcastGroup<u8> = BroadcastGroup::new();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(1);

        assert!(group.add_peer(id, tx.clone()));
        assert!(!group.add_peer(id, tx));
        assert!(group.contains(&id));
        assert!(group.remove_peer(&id));
        assert!(!group.remove_peer(&id));
        assert!(group.is_empty());
    }

    #[test]
    fn test_send_to_unknown_target() {
        let group: BroadcastGroup<u8> = BroadcastGroup::new();
        assert!(!group.send_to(&ConnectionId::new(), 1));
    }
}
