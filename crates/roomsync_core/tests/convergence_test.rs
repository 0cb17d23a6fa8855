//! Convergence of several simulated participants through one room engine.

use roomsync_core::crdt::{DocumentReplica, Message, SyncEngine, SyncMessage};

/// Edits made by one participant, in the order they were made.
struct Participant {
    replica: DocumentReplica,
    updates: Vec<Vec<u8>>,
}

fn participants() -> Vec<Participant> {
    let texts = [("alpha", "-a"), ("beta", "-b"), ("gamma", "-c")];
    texts
        .iter()
        .map(|(first, second)| {
            let replica = DocumentReplica::new();
            let mut updates = vec![replica.insert(0, first)];
            let len = first.chars().count() as u32;
            updates.push(replica.insert(len, second));
            updates.push(replica.delete(0, 1));
            Participant { replica, updates }
        })
        .collect()
}

/// Interleave per-participant update queues following `schedule`, which
/// names the participant to take the next update from. Per-author order is
/// kept, so every produced order is causally valid.
fn interleave(parts: &[Participant], schedule: &[usize]) -> Vec<Vec<u8>> {
    let mut cursors = vec![0; parts.len()];
    let mut out = Vec::new();
    for &p in schedule {
        if let Some(update) = parts[p].updates.get(cursors[p]) {
            out.push(update.clone());
            cursors[p] += 1;
        }
    }
    out
}

fn reconcile(engine: &SyncEngine, replica: &DocumentReplica) {
    let outcome = engine.handle(vec![SyncMessage::SyncStep1(replica.encode_state_vector())]);
    for reply in outcome.replies {
        if let Message::Sync(msgs) = Message::decode(&reply).unwrap() {
            for msg in msgs {
                if let SyncMessage::SyncStep2(diff) = msg {
                    replica.apply_update(&diff).unwrap();
                }
            }
        }
    }
}

#[test]
fn test_all_replicas_converge_for_any_interleaving() {
    let schedules: [&[usize]; 4] = [
        &[0, 0, 0, 1, 1, 1, 2, 2, 2],
        &[2, 2, 2, 1, 1, 1, 0, 0, 0],
        &[0, 1, 2, 0, 1, 2, 0, 1, 2],
        &[1, 2, 1, 0, 2, 0, 1, 0, 2],
    ];

    // Same participants for every schedule so client ids, and with them the
    // tie-breaking of concurrent inserts, are fixed
    let parts = participants();
    let mut finals = Vec::new();
    for schedule in schedules {
        let engine = SyncEngine::new();

        for update in interleave(&parts, schedule) {
            engine.handle(vec![SyncMessage::Update(update)]);
        }
        for part in &parts {
            reconcile(&engine, &part.replica);
        }

        let server = engine.replica().content();
        for part in &parts {
            assert_eq!(part.replica.content(), server);
        }
        finals.push(server);
    }

    // The merged document does not depend on arrival order
    assert!(finals.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(finals[0].len(), "lpha-a".len() + "eta-b".len() + "amma-c".len());
}

#[test]
fn test_direct_exchange_converges_in_reverse_order() {
    let parts = participants();
    let observer = DocumentReplica::new();

    // Every update in reverse order: later edits wait for their dependencies
    let mut all: Vec<Vec<u8>> = parts.iter().flat_map(|p| p.updates.clone()).collect();
    all.reverse();
    for update in &all {
        observer.apply_update(update).unwrap();
    }

    let engine = SyncEngine::new();
    for update in parts.iter().flat_map(|p| p.updates.iter()) {
        engine.handle(vec![SyncMessage::Update(update.clone())]);
    }

    assert_eq!(observer.content(), engine.replica().content());
}

#[test]
fn test_replaying_everything_twice_changes_nothing() {
    let parts = participants();
    let engine = SyncEngine::new();
    let all: Vec<Vec<u8>> = parts.iter().flat_map(|p| p.updates.clone()).collect();

    for update in &all {
        engine.handle(vec![SyncMessage::Update(update.clone())]);
    }
    let once = engine.replica().content();

    for update in &all {
        let outcome = engine.handle(vec![SyncMessage::Update(update.clone())]);
        assert!(outcome.broadcasts.is_empty());
    }
    assert_eq!(engine.replica().content(), once);
}
