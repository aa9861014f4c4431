//! In-memory record store.

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::model::{RecordSummary, SecretRecord, Timestamp, UpsertOutcome};
use crate::store::{CredentialStore, RecordStore};
use crate::table::RecordTable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A record store kept entirely in memory.
///
/// Stands in for the server's relational store and backs most tests.
///
/// # Thread Safety
///
/// All operations go through one `RwLock`, so a conditional upsert's
/// compare and its write happen under the same write guard.
///
/// # Example
///
/// ```rust
/// use keepsync_store::{MemoryRecordStore, RecordStore, SecretKind, SecretRecord, Timestamp};
///
/// let store = MemoryRecordStore::new();
/// let entry = SecretRecord::new("alice", "note", SecretKind::Text, "ab", Timestamp::from_secs(1));
/// store.insert_entry(entry).unwrap();
/// assert_eq!(store.unmerged("alice").unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryRecordStore {
    table: RwLock<RecordTable>,
    credentials: RwLock<HashMap<String, String>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryRecordStore {
    /// Creates an empty store stamping with wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store stamping with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(RecordTable::default()),
            credentials: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Total number of records across all owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owners with at least one record, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        self.table.read().owners()
    }
}

impl RecordStore for MemoryRecordStore {
    fn watermark(&self, owner: &str) -> StoreResult<Timestamp> {
        Ok(self.table.read().watermark(owner))
    }

    fn delta(&self, owner: &str, since: Timestamp) -> StoreResult<Vec<SecretRecord>> {
        Ok(self.table.read().delta(owner, since))
    }

    fn unmerged(&self, owner: &str) -> StoreResult<Vec<SecretRecord>> {
        Ok(self.table.read().unmerged(owner))
    }

    fn conditional_upsert(&self, record: SecretRecord) -> StoreResult<UpsertOutcome> {
        let now = self.clock.now();
        self.table.write().conditional_upsert(record, now)
    }

    fn apply_authoritative(&self, record: SecretRecord) -> StoreResult<()> {
        self.table.write().apply_authoritative(record)
    }

    fn apply_authoritative_many(&self, records: Vec<SecretRecord>) -> StoreResult<usize> {
        self.table.write().apply_authoritative_many(records)
    }

    fn insert_entry(&self, record: SecretRecord) -> StoreResult<()> {
        self.table.write().insert_entry(record)
    }

    fn get(&self, owner: &str, id: &str) -> StoreResult<Option<SecretRecord>> {
        Ok(self.table.read().get(owner, id))
    }

    fn index(&self, owner: &str) -> StoreResult<Vec<RecordSummary>> {
        Ok(self.table.read().index(owner))
    }

    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl CredentialStore for MemoryRecordStore {
    fn save_credential(&self, owner: &str, verifier: &str) -> StoreResult<()> {
        self.credentials
            .write()
            .insert(owner.to_string(), verifier.to_string());
        Ok(())
    }

    fn load_credential(&self, owner: &str) -> StoreResult<Option<String>> {
        Ok(self.credentials.read().get(owner).cloned())
    }
}
