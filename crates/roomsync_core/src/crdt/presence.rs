//! Ephemeral per-connection presence (cursors, user info).
//!
//! Presence updates use the y-protocols awareness layout so stock Yjs clients
//! can talk to the server unchanged:
//!
//! ```text
//! varUint(count)
//! count × { varUint(clientId), varUint(clock), varString(stateJson) }
//! ```
//!
//! The state JSON is never parsed. The literal `null` marks a removal.

use indexmap::IndexMap;

use super::encoding::{Decoder, write_var_string, write_var_uint};
use crate::error::Result;
use crate::types::ConnectionId;

/// State string that tells peers to forget a client.
const REMOVED_STATE: &str = "null";

/// One entry of a presence update as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceState {
    pub client_id: u64,
    pub clock: u64,
    pub state: String,
}

impl PresenceState {
    pub fn is_removal(&self) -> bool {
        self.state == REMOVED_STATE
    }
}

/// A set of presence entries, either a delta or a full snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub entries: Vec<PresenceState>,
}

impl PresenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, self.entries.len() as u64);
        for entry in &self.entries {
            write_var_uint(&mut buf, entry.client_id);
            write_var_uint(&mut buf, entry.clock);
            write_var_string(&mut buf, &entry.state);
        }
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(data);
        let count = dec.read_var_uint("presence entry count")?;
        // Each entry takes at least 3 bytes, so a huge count cannot preallocate much.
        let mut entries = Vec::with_capacity((count as usize).min(data.len() / 3));
        for _ in 0..count {
            let client_id = dec.read_var_uint("presence client id")?;
            let clock = dec.read_var_uint("presence clock")?;
            let state = dec.read_var_string("presence state")?;
            entries.push(PresenceState {
                client_id,
                clock,
                state,
            });
        }
        dec.finish("presence entries")?;
        Ok(Self { entries })
    }
}

/// What the room remembers about one connection's presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    /// Yjs client id the connection announced itself with
    pub client_id: u64,
    /// Last accepted clock
    pub clock: u64,
    pub state: String,
}

impl PresenceEntry {
    fn to_state(&self) -> PresenceState {
        PresenceState {
            client_id: self.client_id,
            clock: self.clock,
            state: self.state.clone(),
        }
    }
}

/// Presence table of one room, keyed by connection.
///
/// Clocks are tracked per connection: an update whose clock is not strictly
/// greater than the last accepted one for that connection is stale and ignored.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: IndexMap<ConnectionId, PresenceEntry>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one presence state for `conn`. Returns false when the clock is stale.
    pub fn update(&mut self, conn: ConnectionId, client_id: u64, clock: u64, state: String) -> bool {
        // A removal notice must be able to outrank the last clock
        if clock == u64::MAX {
            log::debug!("Ignoring presence from {}: clock at u64::MAX", conn);
            return false;
        }
        if let Some(existing) = self.entries.get(&conn)
            && clock <= existing.clock
        {
            log::debug!(
                "Ignoring stale presence from {}: clock {} <= {}",
                conn,
                clock,
                existing.clock
            );
            return false;
        }

        self.entries.insert(
            conn,
            PresenceEntry {
                client_id,
                clock,
                state,
            },
        );
        true
    }

    /// Apply every entry of a wire update on behalf of `conn`.
    ///
    /// Returns the accepted entries, which is what peers need to see.
    pub fn apply(&mut self, conn: ConnectionId, update: &PresenceUpdate) -> PresenceUpdate {
        let entries = update
            .entries
            .iter()
            .filter(|entry| self.update(conn, entry.client_id, entry.clock, entry.state.clone()))
            .cloned()
            .collect();
        PresenceUpdate { entries }
    }

    /// Drop the entries of closed connections.
    ///
    /// The returned notice carries each removed client with a bumped clock and
    /// a `null` state, so peers running stock awareness code drop it too.
    pub fn remove_all(&mut self, conns: &[ConnectionId]) -> PresenceUpdate {
        let entries = conns
            .iter()
            .filter_map(|conn| self.entries.shift_remove(conn))
            .map(|entry| PresenceState {
                client_id: entry.client_id,
                clock: entry.clock.saturating_add(1),
                state: REMOVED_STATE.to_string(),
            })
            .collect();
        PresenceUpdate { entries }
    }

    /// Every live entry, for connections that just joined.
    pub fn snapshot(&self) -> PresenceUpdate {
        let entries = self
            .entries
            .values()
            .map(PresenceEntry::to_state)
            .filter(|state| !state.is_removal())
            .collect();
        PresenceUpdate { entries }
    }

    pub fn get(&self, conn: &ConnectionId) -> Option<&PresenceEntry> {
        self.entries.get(conn)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(client_id: u64, clock: u64, json: &str) -> PresenceState {
        PresenceState {
            client_id,
            clock,
            state: json.to_string(),
        }
    }

    #[test]
    fn test_update_encoding_layout() {
        let update = PresenceUpdate {
            entries: vec![state(1, 2, "{}")],
        };
        assert_eq!(update.encode(), vec![1, 1, 2, 2, b'{', b'}']);
        assert_eq!(PresenceUpdate::decode(&update.encode()).unwrap(), update);
    }

    #[test]
    fn test_decode_truncated_update() {
        // Says two entries, carries one
        let mut bytes = PresenceUpdate {
            entries: vec![state(1, 1, "{}")],
        }
        .encode();
        bytes[0] = 2;
        assert!(PresenceUpdate::decode(&bytes).is_err());
    }

    #[test]
    fn test_stale_clock_is_ignored() {
        let mut tracker = PresenceTracker::new();
        let conn = ConnectionId::new();

        assert!(tracker.update(conn, 7, 5, "{\"cursor\":1}".into()));
        assert!(!tracker.update(conn, 7, 5, "{\"cursor\":2}".into()));
        assert!(!tracker.update(conn, 7, 4, "{\"cursor\":3}".into()));

        let entry = tracker.get(&conn).unwrap();
        assert_eq!(entry.clock, 5);
        assert_eq!(entry.state, "{\"cursor\":1}");

        assert!(tracker.update(conn, 7, 6, "{\"cursor\":4}".into()));
        assert_eq!(tracker.get(&conn).unwrap().state, "{\"cursor\":4}");
    }

    #[test]
    fn test_clocks_are_per_connection() {
        let mut tracker = PresenceTracker::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        assert!(tracker.update(a, 1, 10, "{}".into()));
        // B starting at a lower clock is not stale
        assert!(tracker.update(b, 2, 1, "{}".into()));
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_apply_returns_only_accepted_entries() {
        let mut tracker = PresenceTracker::new();
        let conn = ConnectionId::new();
        tracker.update(conn, 1, 3, "{}".into());

        let update = PresenceUpdate {
            entries: vec![state(1, 2, "{\"old\":true}"), state(1, 4, "{\"new\":true}")],
        };
        let accepted = tracker.apply(conn, &update);

        assert_eq!(accepted.entries, vec![state(1, 4, "{\"new\":true}")]);
    }

    #[test]
    fn test_remove_all_emits_notice_once() {
        let mut tracker = PresenceTracker::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        tracker.update(a, 11, 3, "{\"name\":\"a\"}".into());
        tracker.update(b, 22, 1, "{\"name\":\"b\"}".into());

        let notice = tracker.remove_all(&[a]);
        assert_eq!(notice.entries, vec![state(11, 4, "null")]);
        assert!(notice.entries[0].is_removal());

        // Second removal of the same connection is a no-op
        assert!(tracker.remove_all(&[a]).is_empty());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].client_id, 22);
    }

    #[test]
    fn test_snapshot_skips_client_announced_removals() {
        let mut tracker = PresenceTracker::new();
        let conn = ConnectionId::new();
        tracker.update(conn, 5, 1, "{}".into());
        tracker.update(conn, 5, 2, "null".into());

        assert!(tracker.snapshot().is_empty());
        // The entry is kept so older clocks stay stale
        assert!(!tracker.update(conn, 5, 1, "{}".into()));
    }

    #[test]
    fn test_snapshot_preserves_join_order() {
        let mut tracker = PresenceTracker::new();
        for client_id in 1..=3 {
            tracker.update(ConnectionId::new(), client_id, 1, "{}".into());
        }
        let ids: Vec<u64> = tracker
            .snapshot()
            .entries
            .iter()
            .map(|e| e.client_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_max_clock_cannot_block_removal() {
        let mut tracker = PresenceTracker::new();
        let conn = ConnectionId::new();
        assert!(tracker.update(conn, 9, u64::MAX - 1, "{}".into()));
        assert!(!tracker.update(conn, 9, u64::MAX, "{}".into()));

        let notice = tracker.remove_all(&[conn]);
        assert_eq!(notice.entries, vec![state(9, u64::MAX, "null")]);
        assert!(tracker.is_empty());
    }
}
