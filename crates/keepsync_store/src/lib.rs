//! # keepsync Store
//!
//! Secret record model and the record store contract used by both the
//! merge pipeline (server) and the sync orchestrator (client).
//!
//! ## Design Principles
//!
//! - Records are keyed by `(owner, id)` and never deleted
//! - `merged` is stamped only by a store accepting a conditional upsert
//! - Conflicts resolve last-writer-wins on `updated`; ties keep the stored copy
//! - Stores are `Send + Sync` and take `&self`; each does its own locking
//!
//! ## Available Stores
//!
//! - [`MemoryRecordStore`] - shared in-process store, used as the server's
//!   authoritative store and in tests
//! - [`FileRecordStore`] - single-process JSON document on disk, used as the
//!   client's local cache
//!
//! ## Example
//!
//! ```rust
//! use keepsync_store::{
//!     MemoryRecordStore, RecordStore, SecretKind, SecretRecord, Timestamp, UpsertOutcome,
//! };
//!
//! let store = MemoryRecordStore::new();
//! let record = SecretRecord::new("alice", "bank", SecretKind::Credential, "00ff", Timestamp::from_secs(10));
//! assert_eq!(store.conditional_upsert(record).unwrap(), UpsertOutcome::Inserted);
//! assert!(store.watermark("alice").unwrap() > Timestamp::ZERO);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod error;
mod file;
mod memory;
mod model;
pub mod payload;
mod store;
mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use model::{RecordSummary, SecretKind, SecretRecord, Timestamp, UpsertOutcome};
pub use store::{CredentialStore, RecordStore};
