//! Record store contract.

use crate::error::StoreResult;
use crate::model::{RecordSummary, SecretRecord, Timestamp, UpsertOutcome};

/// Persistence operations the merge engine needs.
///
/// The same contract backs the server's authoritative store and the client's
/// local cache; which operations each side calls differs.
///
/// # Invariants
///
/// - `(owner, id)` is unique
/// - [`conditional_upsert`](Self::conditional_upsert) is the only operation
///   that assigns a fresh `merged` stamp, and its compare-and-write is atomic
///   with respect to concurrent callers
/// - Merge stamps for one owner are strictly increasing, so a delta pull with
///   `since = watermark` never misses a later merge
/// - Records are never deleted
///
/// # Implementors
///
/// - [`crate::MemoryRecordStore`]
/// - [`crate::FileRecordStore`]
pub trait RecordStore: Send + Sync {
    /// Maximum `merged` across the owner's records, or [`Timestamp::ZERO`].
    fn watermark(&self, owner: &str) -> StoreResult<Timestamp>;

    /// All of the owner's records with `merged > since`, oldest merge first.
    fn delta(&self, owner: &str, since: Timestamp) -> StoreResult<Vec<SecretRecord>>;

    /// All of the owner's records with `merged` unset.
    fn unmerged(&self, owner: &str) -> StoreResult<Vec<SecretRecord>>;

    /// Last-writer-wins insert-or-update.
    ///
    /// Inserts when `(owner, id)` is absent. Overwrites when
    /// `incoming.updated > stored.updated`. Otherwise returns
    /// [`UpsertOutcome::Rejected`] and changes nothing. Any write stamps a fresh
    /// `merged`; the incoming record's own `merged` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` for an empty owner or id, or a storage error.
    fn conditional_upsert(&self, record: SecretRecord) -> StoreResult<UpsertOutcome>;

    /// Unconditional overwrite by `(owner, id)`, keeping the record's `merged`.
    ///
    /// Used only to apply server-confirmed deltas locally.
    fn apply_authoritative(&self, record: SecretRecord) -> StoreResult<()>;

    /// Applies a whole delta with [`apply_authoritative`](Self::apply_authoritative)
    /// semantics, returning the number of records applied.
    ///
    /// Stores that persist on every write override this to persist once.
    fn apply_authoritative_many(&self, records: Vec<SecretRecord>) -> StoreResult<usize> {
        let count = records.len();
        for record in records {
            self.apply_authoritative(record)?;
        }
        Ok(count)
    }

    /// Inserts a freshly entered local record with `merged` unset.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if `(owner, id)` is present.
    fn insert_entry(&self, record: SecretRecord) -> StoreResult<()>;

    /// Fetches one record.
    fn get(&self, owner: &str, id: &str) -> StoreResult<Option<SecretRecord>>;

    /// Listing of the owner's records ordered by `updated`.
    fn index(&self, owner: &str) -> StoreResult<Vec<RecordSummary>>;

    /// Checks that the store can serve requests.
    fn ping(&self) -> StoreResult<()>;
}

/// The small table of offline-login verifiers.
///
/// A verifier is the owner's identity sealed under their derived key. Being
/// able to open it proves the password without contacting the server.
pub trait CredentialStore: Send + Sync {
    /// Stores (or replaces) the owner's verifier.
    fn save_credential(&self, owner: &str, verifier: &str) -> StoreResult<()>;

    /// Loads the owner's verifier, if any.
    fn load_credential(&self, owner: &str) -> StoreResult<Option<String>>;
}
