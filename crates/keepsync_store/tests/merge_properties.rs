//! Property tests for the conditional upsert rule.

use keepsync_store::{
    ManualClock, MemoryRecordStore, RecordStore, SecretKind, SecretRecord, Timestamp,
    UpsertOutcome,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn record_strategy() -> impl Strategy<Value = SecretRecord> {
    (
        prop::sample::select(vec!["alice", "bob"]),
        prop::string::string_regex("[a-c]{1,2}").expect("Invalid regex"),
        0i64..1_000,
        prop::string::string_regex("[0-9a-f]{2,8}").expect("Invalid regex"),
    )
        .prop_map(|(owner, id, updated, data)| {
            SecretRecord::new(owner, id, SecretKind::Text, data, Timestamp::from_secs(updated))
        })
}

fn snapshot(store: &MemoryRecordStore) -> Vec<SecretRecord> {
    let mut out = store.delta("alice", Timestamp::ZERO).unwrap();
    out.extend(store.delta("bob", Timestamp::ZERO).unwrap());
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn replaying_a_batch_changes_nothing(batch in prop::collection::vec(record_strategy(), 1..30)) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10_000)));
        let store = MemoryRecordStore::with_clock(clock.clone());

        for record in &batch {
            store.conditional_upsert(record.clone()).unwrap();
        }
        let first = snapshot(&store);

        clock.advance(60);
        for record in &batch {
            let outcome = store.conditional_upsert(record.clone()).unwrap();
            prop_assert_eq!(outcome, UpsertOutcome::Rejected);
        }
        prop_assert_eq!(snapshot(&store), first);
    }

    #[test]
    fn newest_updated_wins_regardless_of_order(
        versions in prop::collection::btree_set(0i64..10_000, 1..12),
        seed in any::<u64>(),
    ) {
        let mut ordered: Vec<i64> = versions.into_iter().collect();
        let newest = *ordered.last().unwrap();

        // Deterministic shuffle from the seed
        let mut state = seed | 1;
        for i in (1..ordered.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            ordered.swap(i, j);
        }

        let store = MemoryRecordStore::new();
        for updated in &ordered {
            let record = SecretRecord::new(
                "alice", "x", SecretKind::Card, format!("v{updated}"), Timestamp::from_secs(*updated),
            );
            store.conditional_upsert(record).unwrap();
        }

        let stored = store.get("alice", "x").unwrap().unwrap();
        prop_assert_eq!(stored.updated, Timestamp::from_secs(newest));
        prop_assert_eq!(stored.data, format!("v{newest}"));
    }

    #[test]
    fn merge_stamps_are_unique_per_owner(batch in prop::collection::vec(record_strategy(), 1..40)) {
        let store = MemoryRecordStore::with_clock(Arc::new(ManualClock::new(Timestamp::from_secs(5))));
        for record in batch {
            store.conditional_upsert(record).unwrap();
        }

        for owner in ["alice", "bob"] {
            let mut seen: HashMap<Timestamp, String> = HashMap::new();
            for record in store.delta(owner, Timestamp::ZERO).unwrap() {
                let stamp = record.merged.unwrap();
                prop_assert!(seen.insert(stamp, record.id).is_none());
            }
        }
    }
}
