//! Record table shared by the store implementations.
//!
//! The table holds no lock of its own; each store wraps it in whatever
//! locking and persistence it needs.

use crate::error::{StoreError, StoreResult};
use crate::model::{RecordSummary, SecretRecord, Timestamp, UpsertOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct RecordTable {
    owners: BTreeMap<String, BTreeMap<String, SecretRecord>>,
}

impl RecordTable {
    fn records<'a>(&'a self, owner: &str) -> impl Iterator<Item = &'a SecretRecord> + 'a {
        self.owners.get(owner).into_iter().flat_map(|m| m.values())
    }

    pub(crate) fn len(&self) -> usize {
        self.owners.values().map(BTreeMap::len).sum()
    }

    pub(crate) fn owners(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }

    pub(crate) fn watermark(&self, owner: &str) -> Timestamp {
        self.records(owner)
            .filter_map(|r| r.merged)
            .max()
            .unwrap_or(Timestamp::ZERO)
    }

    pub(crate) fn delta(&self, owner: &str, since: Timestamp) -> Vec<SecretRecord> {
        let mut out: Vec<SecretRecord> = self
            .records(owner)
            .filter(|r| r.merged.is_some_and(|m| m > since))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.merged);
        out
    }

    pub(crate) fn unmerged(&self, owner: &str) -> Vec<SecretRecord> {
        let mut out: Vec<SecretRecord> = self
            .records(owner)
            .filter(|r| r.is_unmerged())
            .cloned()
            .collect();
        out.sort_by_key(|r| r.updated);
        out
    }

    pub(crate) fn get(&self, owner: &str, id: &str) -> Option<SecretRecord> {
        self.owners.get(owner).and_then(|m| m.get(id)).cloned()
    }

    pub(crate) fn index(&self, owner: &str) -> Vec<RecordSummary> {
        let mut out: Vec<RecordSummary> = self.records(owner).map(SecretRecord::summary).collect();
        out.sort_by(|a, b| a.updated.cmp(&b.updated).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// `max(now, high_water + 1)`: strictly above every stamp the owner has.
    fn next_stamp(&self, owner: &str, now: Timestamp) -> Timestamp {
        let high = self.watermark(owner);
        if now > high {
            now
        } else {
            high.next()
        }
    }

    pub(crate) fn conditional_upsert(
        &mut self,
        mut record: SecretRecord,
        now: Timestamp,
    ) -> StoreResult<UpsertOutcome> {
        record.validate()?;

        let outcome = match self.owners.get(&record.owner).and_then(|m| m.get(&record.id)) {
            None => UpsertOutcome::Inserted,
            Some(stored) if record.updated > stored.updated => UpsertOutcome::Updated,
            Some(_) => return Ok(UpsertOutcome::Rejected),
        };

        record.merged = Some(self.next_stamp(&record.owner, now));
        self.owners
            .entry(record.owner.clone())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(outcome)
    }

    pub(crate) fn apply_authoritative(&mut self, record: SecretRecord) -> StoreResult<()> {
        record.validate()?;
        self.owners
            .entry(record.owner.clone())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    /// Applies every record or, if any is invalid, none of them.
    pub(crate) fn apply_authoritative_many(&mut self, records: Vec<SecretRecord>) -> StoreResult<usize> {
        for record in &records {
            record.validate()?;
        }
        let count = records.len();
        for record in records {
            self.owners
                .entry(record.owner.clone())
                .or_default()
                .insert(record.id.clone(), record);
        }
        Ok(count)
    }

    pub(crate) fn insert_entry(&mut self, mut record: SecretRecord) -> StoreResult<()> {
        record.validate()?;
        let records = self.owners.entry(record.owner.clone()).or_default();
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                owner: record.owner,
                id: record.id,
            });
        }
        record.merged = None;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Checks that every record sits under its own `(owner, id)` key.
    pub(crate) fn check_keys(&self) -> StoreResult<()> {
        for (owner, records) in &self.owners {
            for (id, record) in records {
                if &record.owner != owner || &record.id != id {
                    return Err(StoreError::Corrupted(format!(
                        "record ({}, {}) filed under ({owner}, {id})",
                        record.owner, record.id
                    )));
                }
            }
        }
        Ok(())
    }
}
