//! Transport layer abstraction for talking to the keepsync server.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use keepsync_store::{MemoryRecordStore, RecordStore, SecretRecord, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A sync transport carries the client's remote calls.
///
/// Implementations report an unreachable remote as
/// [`SyncError::Unavailable`] and a rejected token as
/// [`SyncError::SessionExpired`]; the orchestrator relies on that split.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Creates an account and returns a session token.
    async fn register(&self, usr: &str, pass: &str) -> SyncResult<String>;

    /// Authenticates and returns a session token.
    async fn login(&self, usr: &str, pass: &str) -> SyncResult<String>;

    /// Fetches every record merged after `since`.
    async fn download(&self, token: &str, since: Timestamp) -> SyncResult<Vec<SecretRecord>>;

    /// Pushes records for merging. Acceptance does not mean they are merged yet.
    async fn upload(&self, token: &str, records: &[SecretRecord]) -> SyncResult<()>;
}

const MOCK_TOKEN_PREFIX: &str = "mock:";

/// A mock transport for testing.
///
/// Merges uploads into an in-memory store immediately, so a download right
/// after an upload sees the result.
pub struct MockTransport {
    remote: MemoryRecordStore,
    accounts: Mutex<HashMap<String, String>>,
    available: AtomicBool,
    token_expired: AtomicBool,
    downloads: AtomicU64,
    uploads: AtomicU64,
}

impl MockTransport {
    /// Creates a new mock transport that is reachable and has no accounts.
    pub fn new() -> Self {
        Self {
            remote: MemoryRecordStore::new(),
            accounts: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            token_expired: AtomicBool::new(false),
            downloads: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
        }
    }

    /// Makes every call fail with `Unavailable` while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes data calls fail with `SessionExpired` while `true`.
    pub fn set_token_expired(&self, expired: bool) {
        self.token_expired.store(expired, Ordering::SeqCst);
    }

    /// The simulated authoritative store.
    pub fn remote(&self) -> &MemoryRecordStore {
        &self.remote
    }

    /// Number of download calls that reached the remote.
    pub fn download_count(&self) -> u64 {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Number of upload calls that reached the remote.
    pub fn upload_count(&self) -> u64 {
        self.uploads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> SyncResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::Unavailable("mock transport offline".into()))
        }
    }

    fn owner_of<'a>(&self, token: &'a str) -> SyncResult<&'a str> {
        if self.token_expired.load(Ordering::SeqCst) {
            return Err(SyncError::SessionExpired);
        }
        token
            .strip_prefix(MOCK_TOKEN_PREFIX)
            .ok_or(SyncError::SessionExpired)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("available", &self.available.load(Ordering::SeqCst))
            .field("token_expired", &self.token_expired.load(Ordering::SeqCst))
            .field("downloads", &self.download_count())
            .field("uploads", &self.upload_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn register(&self, usr: &str, pass: &str) -> SyncResult<String> {
        self.check_available()?;
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(usr) {
            return Err(SyncError::AlreadyExists(usr.to_string()));
        }
        accounts.insert(usr.to_string(), pass.to_string());
        Ok(format!("{MOCK_TOKEN_PREFIX}{usr}"))
    }

    async fn login(&self, usr: &str, pass: &str) -> SyncResult<String> {
        self.check_available()?;
        match self.accounts.lock().get(usr) {
            Some(stored) if stored == pass => Ok(format!("{MOCK_TOKEN_PREFIX}{usr}")),
            _ => Err(SyncError::InvalidCredentials),
        }
    }

    async fn download(&self, token: &str, since: Timestamp) -> SyncResult<Vec<SecretRecord>> {
        self.check_available()?;
        let owner = self.owner_of(token)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote.delta(owner, since)?)
    }

    async fn upload(&self, token: &str, records: &[SecretRecord]) -> SyncResult<()> {
        self.check_available()?;
        let owner = self.owner_of(token)?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        for record in records {
            let mut record = record.clone();
            record.owner = owner.to_string();
            record.merged = None;
            self.remote.conditional_upsert(record)?;
        }
        Ok(())
    }
}
