//! Merge command implementation.
//!
//! Imports a batch of wire records into a client store as new local entries.
//! Imported records are unmerged, so the next upload pushes them through the
//! server's pipeline, which alone decides the winner and assigns `merged`.
//! The local watermark is never touched.

use keepsync_protocol::decode_records;
use keepsync_store::{MemoryRecordStore, RecordStore, SecretRecord, StoreError, Timestamp};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Merge result.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct MergeReport {
    /// Records read from the input.
    pub records: usize,
    /// Records imported as unmerged entries.
    pub inserted: usize,
    /// Records whose id is already held locally.
    pub existing: usize,
    /// Records skipped for an empty owner or id.
    pub invalid: usize,
}

/// Inserts every record into `store` as an unmerged entry, counting outcomes.
pub fn merge_into(
    store: &dyn RecordStore,
    records: Vec<SecretRecord>,
) -> Result<MergeReport, StoreError> {
    let mut report = MergeReport {
        records: records.len(),
        ..MergeReport::default()
    };

    for record in records {
        let key = format!("{}/{}", record.owner, record.id);
        match store.insert_entry(record) {
            Ok(()) => report.inserted += 1,
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(%key, "already held locally");
                report.existing += 1;
            }
            Err(StoreError::InvalidRecord(reason)) => {
                warn!(%key, %reason, "skipping record");
                report.invalid += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

/// Copies the stored state of every owner in `records` into memory.
fn shadow(store: &dyn RecordStore, records: &[SecretRecord]) -> Result<MemoryRecordStore, StoreError> {
    let shadow = MemoryRecordStore::new();
    let owners: BTreeSet<&str> = records
        .iter()
        .map(|r| r.owner.as_str())
        .filter(|owner| !owner.is_empty())
        .collect();
    for owner in owners {
        let mut existing = store.delta(owner, Timestamp::ZERO)?;
        existing.extend(store.unmerged(owner)?);
        shadow.apply_authoritative_many(existing)?;
    }
    Ok(shadow)
}

/// Runs the merge command.
pub fn run(
    path: &Path,
    input: &Path,
    owner: Option<&str>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = std::fs::read(input)?;
    let mut records = decode_records(&body)?;
    if let Some(owner) = owner {
        for record in &mut records {
            record.owner = owner.to_string();
        }
    }

    let store = keepsync_store::FileRecordStore::open(path)?;
    let report = if dry_run {
        let shadow = shadow(&store, &records)?;
        merge_into(&shadow, records)?
    } else {
        merge_into(&store, records)?
    };

    info!(
        input = %input.display(),
        inserted = report.inserted,
        existing = report.existing,
        invalid = report.invalid,
        dry_run,
        "merge finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsync_protocol::encode_records;
    use keepsync_store::{FileRecordStore, SecretKind};

    fn rec(owner: &str, id: &str, updated: i64) -> SecretRecord {
        SecretRecord::new(owner, id, SecretKind::Text, "ab", Timestamp::from_secs(updated))
    }

    #[test]
    fn merge_counts_outcomes() {
        let store = MemoryRecordStore::new();
        store.insert_entry(rec("alice", "kept", 10)).unwrap();

        let batch = vec![rec("alice", "new", 1), rec("alice", "kept", 20), rec("alice", "", 1)];
        let report = merge_into(&store, batch).unwrap();
        assert_eq!(
            report,
            MergeReport {
                records: 3,
                inserted: 1,
                existing: 1,
                invalid: 1,
            }
        );
        // The local copy is left for the server to arbitrate
        assert_eq!(
            store.get("alice", "kept").unwrap().unwrap().updated,
            Timestamp::from_secs(10)
        );
    }

    #[test]
    fn imported_records_wait_for_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::open(&dir.path().join("store.json")).unwrap();
        let confirmed = rec("alice", "old", 1).with_merged(Timestamp::from_secs(40));
        store.apply_authoritative(confirmed).unwrap();

        // A merge stamp in the input is not trusted
        let incoming = rec("alice", "a", 5).with_merged(Timestamp::from_secs(9_999));
        let report = merge_into(&store, vec![incoming]).unwrap();
        assert_eq!(report.inserted, 1);

        let unmerged = store.unmerged("alice").unwrap();
        assert_eq!(unmerged.len(), 1);
        assert_eq!(unmerged[0].id, "a");
        assert!(unmerged[0].merged.is_none());
        assert_eq!(store.watermark("alice").unwrap(), Timestamp::from_secs(40));
    }

    #[test]
    fn dry_run_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let input = dir.path().join("batch.json");

        {
            let store = FileRecordStore::open(&path).unwrap();
            store.insert_entry(rec("alice", "a", 10)).unwrap();
        }
        std::fs::write(&input, encode_records(&[rec("alice", "a", 20), rec("alice", "b", 1)]).unwrap())
            .unwrap();

        run(&path, &input, None, true).unwrap();
        {
            let store = FileRecordStore::open(&path).unwrap();
            assert_eq!(store.len(), 1);
        }

        run(&path, &input, None, false).unwrap();
        let store = FileRecordStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("alice", "a").unwrap().unwrap().updated, Timestamp::from_secs(10));
        assert_eq!(store.unmerged("alice").unwrap().len(), 2);
    }

    #[test]
    fn owner_override_reowns_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let input = dir.path().join("batch.json");
        std::fs::write(&input, encode_records(&[rec("mallory", "a", 1)]).unwrap()).unwrap();

        run(&path, &input, Some("alice"), false).unwrap();
        let store = FileRecordStore::open(&path).unwrap();
        assert!(store.get("alice", "a").unwrap().is_some());
        assert!(store.get("mallory", "a").unwrap().is_none());
    }
}
