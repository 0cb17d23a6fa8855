//! Room document replica.
//!
//! A `DocumentReplica` wraps one Y.Doc holding a single Y.Text. The server
//! only merges and diffs it; the text accessors exist for inspection and for
//! simulating participants in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use yrs::{
    Doc, GetString, ReadTxn, StateVector, Text, TextRef, Transact, TransactionMut, Update,
    updates::decoder::Decode, updates::encoder::Encode,
};

use crate::error::{Result, SyncError};

/// Name of the Y.Text holding the shared document.
pub const TEXT_NAME: &str = "content";

pub struct DocumentReplica {
    doc: Doc,
    text: TextRef,
}

impl DocumentReplica {
    /// Create an empty replica.
    pub fn new() -> Self {
        let doc = Doc::new();
        let text = doc.get_or_insert_text(TEXT_NAME);
        Self { doc, text }
    }

    /// Full state as a single update.
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Compact summary of which edits this replica holds.
    pub fn encode_state_vector(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode what a peer with `remote_state_vector` is missing.
    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| SyncError::Crdt(format!("Failed to decode state vector: {}", e)))?;
        let txn = self.doc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Merge a remote update.
    ///
    /// Returns `true` when the merge changed the document. Updates that were
    /// already applied, and updates parked until their dependencies arrive,
    /// return `false`.
    pub fn apply_update(&self, update: &[u8]) -> Result<bool> {
        let decoded = Update::decode_v1(update)
            .map_err(|e| SyncError::Crdt(format!("Failed to decode update: {}", e)))?;

        let changed = Arc::new(AtomicBool::new(false));
        let flag = changed.clone();
        // yrs only emits update events for transactions that integrated something
        let _sub = self
            .doc
            .observe_update_v1(move |_, _| flag.store(true, Ordering::SeqCst))
            .map_err(|e| SyncError::Crdt(format!("Failed to observe updates: {:?}", e)))?;

        {
            let mut txn = self.doc.transact_mut();
            txn.apply_update(decoded)
                .map_err(|e| SyncError::Crdt(format!("Failed to apply update: {}", e)))?;
        }

        Ok(changed.load(Ordering::SeqCst))
    }

    /// Current text content.
    pub fn content(&self) -> String {
        let txn = self.doc.transact();
        self.text.get_string(&txn)
    }

    /// Insert text locally and return the incremental update.
    pub fn insert(&self, index: u32, chunk: &str) -> Vec<u8> {
        self.record(|txn, text| text.insert(txn, index, chunk))
    }

    /// Delete a range locally and return the incremental update.
    pub fn delete(&self, index: u32, len: u32) -> Vec<u8> {
        self.record(|txn, text| text.remove_range(txn, index, len))
    }

    fn record<F>(&self, edit: F) -> Vec<u8>
    where
        F: FnOnce(&mut TransactionMut, &TextRef),
    {
        let sv_before = {
            let txn = self.doc.transact();
            txn.state_vector()
        };

        {
            let mut txn = self.doc.transact_mut();
            edit(&mut txn, &self.text);
        }

        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&sv_before)
    }
}

impl Default for DocumentReplica {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentReplica")
            .field("client_id", &self.doc.client_id())
            .field("content_len", &self.content().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_replica_is_empty() {
        let replica = DocumentReplica::new();
        assert_eq!(replica.content(), "");
    }

    #[test]
    fn test_local_edits_produce_updates() {
        let a = DocumentReplica::new();
        let b = DocumentReplica::new();

        let insert = a.insert(0, "hello");
        assert!(b.apply_update(&insert).unwrap());
        assert_eq!(b.content(), "hello");

        let delete = a.delete(0, 1);
        assert!(b.apply_update(&delete).unwrap());
        assert_eq!(a.content(), "ello");
        assert_eq!(b.content(), "ello");
    }

    #[test]
    fn test_apply_is_idempotent() {
        let a = DocumentReplica::new();
        let b = DocumentReplica::new();

        let insert = a.insert(0, "hello");
        assert!(b.apply_update(&insert).unwrap());
        assert!(!b.apply_update(&insert).unwrap());
        assert_eq!(b.content(), "hello");

        let delete = a.delete(4, 1);
        assert!(b.apply_update(&delete).unwrap());
        assert!(!b.apply_update(&delete).unwrap());
        assert_eq!(b.content(), "hell");
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let a = DocumentReplica::new();
        let b = DocumentReplica::new();

        let base = a.insert(0, "Hello World");
        b.apply_update(&base).unwrap();

        let from_a = a.insert(0, "A: ");
        let from_b = b.insert(11, "!");

        a.apply_update(&from_b).unwrap();
        b.apply_update(&from_a).unwrap();

        assert_eq!(a.content(), b.content());
        assert!(a.content().starts_with("A: "));
        assert!(a.content().ends_with('!'));
    }

    #[test]
    fn test_encode_diff_sends_only_missing_edits() {
        let a = DocumentReplica::new();
        let b = DocumentReplica::new();

        b.apply_update(&a.insert(0, "Initial content")).unwrap();
        let sv_b = b.encode_state_vector();

        a.insert(0, "NEW: ");
        let diff = a.encode_diff(&sv_b).unwrap();
        assert!(diff.len() < a.encode_state_as_update().len());

        assert!(b.apply_update(&diff).unwrap());
        assert_eq!(b.content(), "NEW: Initial content");
    }

    #[test]
    fn test_diff_against_empty_summary_is_full_state() {
        let a = DocumentReplica::new();
        a.insert(0, "hello");

        let fresh = DocumentReplica::new();
        let diff = a.encode_diff(&fresh.encode_state_vector()).unwrap();
        fresh.apply_update(&diff).unwrap();
        assert_eq!(fresh.content(), "hello");
    }

    #[test]
    fn test_garbage_update_leaves_state_untouched() {
        let replica = DocumentReplica::new();
        replica.insert(0, "keep me");

        assert!(replica.apply_update(&[0xFF, 0xFF, 0xFF]).is_err());
        assert!(replica.encode_diff(&[0xFF, 0xFF, 0xFF]).is_err());
        assert_eq!(replica.content(), "keep me");
    }

    #[test]
    fn test_out_of_order_update_waits_for_dependency() {
        let a = DocumentReplica::new();
        let b = DocumentReplica::new();

        let first = a.insert(0, "ab");
        let second = a.insert(2, "cd");

        // Depends on `first`, so nothing integrates yet
        assert!(!b.apply_update(&second).unwrap());
        assert_eq!(b.content(), "");

        assert!(b.apply_update(&first).unwrap());
        assert_eq!(b.content(), "abcd");
    }
}
