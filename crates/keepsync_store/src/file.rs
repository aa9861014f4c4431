//! File-backed record store for the client's local cache.

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::model::{RecordSummary, SecretRecord, Timestamp, UpsertOutcome};
use crate::store::{CredentialStore, RecordStore};
use crate::table::RecordTable;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    records: RecordTable,
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

/// A record store persisted as one JSON document.
///
/// Every mutation rewrites the document to `<path>.tmp`, syncs it
/// and renames it over the original, so a crash leaves either the old or the
/// new document. An exclusive `fs2` lock on `<path>.lock` keeps a second
/// process from opening the same store.
///
/// # Example
///
/// ```no_run
/// use keepsync_store::{FileRecordStore, RecordStore};
/// use std::path::Path;
///
/// let store = FileRecordStore::open(Path::new("keepsync.json")).unwrap();
/// let watermark = store.watermark("alice").unwrap();
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    doc: RwLock<Document>,
    clock: Arc<dyn Clock>,
    _lock_file: File,
}

impl FileRecordStore {
    /// Opens or creates the store at `path` stamping with wall-clock time.
    ///
    /// # Errors
    ///
    /// - `Locked` if another process has the store open
    /// - `Corrupted` if the existing document cannot be decoded
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Opens or creates the store at `path` stamping with `clock`.
    pub fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = sibling_path(path, ".lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(lock_path));
        }

        let doc = if path.exists() {
            let bytes = fs::read(path)?;
            let doc: Document = serde_json::from_slice(&bytes)?;
            if doc.version != FORMAT_VERSION {
                return Err(StoreError::Corrupted(format!(
                    "unsupported format version {}",
                    doc.version
                )));
            }
            doc.records.check_keys()?;
            doc
        } else {
            Document {
                version: FORMAT_VERSION,
                ..Document::default()
            }
        };

        tracing::debug!(path = %path.display(), records = doc.records.len(), "opened record store");

        Ok(Self {
            path: path.to_path_buf(),
            doc: RwLock::new(doc),
            clock,
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of records across all owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.read().records.len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owners with at least one record, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        self.doc.read().records.owners()
    }

    /// Applies `f` to a copy of the document and persists it.
    ///
    /// The in-memory document is replaced only after the write succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut Document) -> StoreResult<(T, bool)>) -> StoreResult<T> {
        let mut doc = self.doc.write();
        let mut next = doc.clone();
        let (value, changed) = f(&mut next)?;
        if changed {
            self.persist(&next)?;
            *doc = next;
        }
        Ok(value)
    }

    fn persist(&self, doc: &Document) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StoreError::Corrupted(format!("encode failed: {e}")))?;

        let tmp = sibling_path(&self.path, ".tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// `path` with `suffix` appended to the full file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl RecordStore for FileRecordStore {
    fn watermark(&self, owner: &str) -> StoreResult<Timestamp> {
        Ok(self.doc.read().records.watermark(owner))
    }

    fn delta(&self, owner: &str, since: Timestamp) -> StoreResult<Vec<SecretRecord>> {
        Ok(self.doc.read().records.delta(owner, since))
    }

    fn unmerged(&self, owner: &str) -> StoreResult<Vec<SecretRecord>> {
        Ok(self.doc.read().records.unmerged(owner))
    }

    fn conditional_upsert(&self, record: SecretRecord) -> StoreResult<UpsertOutcome> {
        let now = self.clock.now();
        self.mutate(|doc| {
            let outcome = doc.records.conditional_upsert(record, now)?;
            Ok((outcome, outcome.is_write()))
        })
    }

    fn apply_authoritative(&self, record: SecretRecord) -> StoreResult<()> {
        self.mutate(|doc| doc.records.apply_authoritative(record).map(|()| ((), true)))
    }

    fn apply_authoritative_many(&self, records: Vec<SecretRecord>) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.mutate(|doc| {
            doc.records
                .apply_authoritative_many(records)
                .map(|count| (count, true))
        })
    }

    fn insert_entry(&self, record: SecretRecord) -> StoreResult<()> {
        self.mutate(|doc| doc.records.insert_entry(record).map(|()| ((), true)))
    }

    fn get(&self, owner: &str, id: &str) -> StoreResult<Option<SecretRecord>> {
        Ok(self.doc.read().records.get(owner, id))
    }

    fn index(&self, owner: &str) -> StoreResult<Vec<RecordSummary>> {
        Ok(self.doc.read().records.index(owner))
    }

    fn ping(&self) -> StoreResult<()> {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => fs::metadata(dir).map(|_| ()).map_err(StoreError::from),
            None => Ok(()),
        }
    }
}

impl CredentialStore for FileRecordStore {
    fn save_credential(&self, owner: &str, verifier: &str) -> StoreResult<()> {
        self.mutate(|doc| {
            doc.credentials
                .insert(owner.to_string(), verifier.to_string());
            Ok(((), true))
        })
    }

    fn load_credential(&self, owner: &str) -> StoreResult<Option<String>> {
        Ok(self.doc.read().credentials.get(owner).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::SecretKind;
    use tempfile::tempdir;

    fn rec(id: &str, data: &str, updated: i64) -> SecretRecord {
        SecretRecord::new("alice", id, SecretKind::File, data, Timestamp::from_secs(updated))
    }

    #[test]
    fn file_open_creates_empty_store() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(&dir.path().join("store.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.ping().is_ok());
    }

    #[test]
    fn file_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileRecordStore::open(&path).unwrap();
            store.insert_entry(rec("a", "A", 1)).unwrap();
            store
                .apply_authoritative(rec("b", "B", 2).with_merged(Timestamp::from_secs(40)))
                .unwrap();
            store.save_credential("alice", "verifier").unwrap();
        }

        let store = FileRecordStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.unmerged("alice").unwrap()[0].id, "a");
        assert_eq!(store.watermark("alice").unwrap(), Timestamp::from_secs(40));
        assert_eq!(
            store.load_credential("alice").unwrap().as_deref(),
            Some("verifier")
        );
    }

    #[test]
    fn file_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let _first = FileRecordStore::open(&path).unwrap();
        let second = FileRecordStore::open(&path);
        assert!(matches!(second, Err(StoreError::Locked(_))));
    }

    #[test]
    fn file_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        drop(FileRecordStore::open(&path).unwrap());
        assert!(FileRecordStore::open(&path).is_ok());
    }

    #[test]
    fn file_lists_owners() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(&dir.path().join("store.json")).unwrap();
        assert!(store.owners().is_empty());

        let mut bob = rec("x", "X", 1);
        bob.owner = "bob".into();
        store.insert_entry(bob).unwrap();
        store.insert_entry(rec("a", "A", 1)).unwrap();
        assert_eq!(store.owners(), vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn file_corrupted_document_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            FileRecordStore::open(&path),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn file_rejected_upsert_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
        let store = FileRecordStore::open_with_clock(&path, clock).unwrap();

        store.conditional_upsert(rec("a", "A", 5)).unwrap();
        let before = fs::read(&path).unwrap();

        let outcome = store.conditional_upsert(rec("a", "old", 4)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Rejected);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn file_failed_insert_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(&dir.path().join("store.json")).unwrap();
        store.insert_entry(rec("a", "A", 1)).unwrap();

        assert!(store.insert_entry(rec("a", "B", 2)).is_err());
        assert_eq!(store.get("alice", "a").unwrap().unwrap().data, "A");
    }

    #[test]
    fn file_stores_sharing_a_stem_use_distinct_temp_files() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("a.json");
        let db = dir.path().join("a.db");
        assert_ne!(sibling_path(&json, ".tmp"), sibling_path(&db, ".tmp"));
        assert_eq!(sibling_path(&json, ".tmp"), dir.path().join("a.json.tmp"));

        {
            let first = FileRecordStore::open(&json).unwrap();
            let second = FileRecordStore::open(&db).unwrap();
            first.insert_entry(rec("a", "A", 1)).unwrap();
            second.insert_entry(rec("b", "B", 1)).unwrap();
        }

        let first = FileRecordStore::open(&json).unwrap();
        let second = FileRecordStore::open(&db).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first.get("alice", "a").unwrap().is_some());
        assert_eq!(second.len(), 1);
        assert!(second.get("alice", "b").unwrap().is_some());
        assert!(!dir.path().join("a.tmp").exists());
    }

    #[test]
    fn file_applies_delta_in_one_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileRecordStore::open(&path).unwrap();
        store.insert_entry(rec("a", "local", 5)).unwrap();

        let delta = vec![
            rec("a", "remote", 3).with_merged(Timestamp::from_secs(10)),
            rec("b", "B", 4).with_merged(Timestamp::from_secs(11)),
        ];
        assert_eq!(store.apply_authoritative_many(delta).unwrap(), 2);
        assert_eq!(store.get("alice", "a").unwrap().unwrap().data, "remote");
        assert!(store.unmerged("alice").unwrap().is_empty());
        assert_eq!(store.watermark("alice").unwrap(), Timestamp::from_secs(11));
        drop(store);

        let reopened = FileRecordStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.watermark("alice").unwrap(), Timestamp::from_secs(11));
    }

    #[test]
    fn file_invalid_delta_applies_nothing() {
        let dir = tempdir().unwrap();
        let store = FileRecordStore::open(&dir.path().join("store.json")).unwrap();

        let delta = vec![
            rec("a", "A", 1).with_merged(Timestamp::from_secs(10)),
            rec("", "B", 1).with_merged(Timestamp::from_secs(11)),
        ];
        assert!(matches!(
            store.apply_authoritative_many(delta),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn file_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("store.json");
        let store = FileRecordStore::open(&path).unwrap();
        store.insert_entry(rec("a", "A", 1)).unwrap();
        assert!(path.exists());
    }
}
