//! # keepsync Engine
//!
//! Client side of keepsync.
//!
//! This crate provides:
//! - [`Client`], the facade for login, entering and revealing secrets
//! - [`SyncOrchestrator`], the periodic download-then-upload loop
//! - [`LocalAuth`], online verifier bookkeeping and offline login
//! - Transport abstraction ([`SyncTransport`], [`HttpTransport`], [`HttpClient`])
//!
//! ## Architecture
//!
//! Entries are sealed by the session's crypto key and stored locally with
//! `merged` unset. The orchestrator pushes unmerged records and pulls every
//! record the server merged after the local watermark:
//!
//! ```text
//! enter ──▶ local store (unmerged) ──upload──▶ server pipeline
//!                 ▲                                  │
//!                 └──────────── download ◀───────────┘ (merged > watermark)
//! ```
//!
//! ## Key Invariants
//!
//! - The server is authoritative; downloads overwrite local copies
//! - The client never marks its own records merged
//! - `SessionExpired` is never swallowed; it ends the background loop
//! - An unavailable remote is not an error for the local user

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod client;
mod config;
mod error;
mod http;
mod orchestrator;
mod transport;

pub use auth::LocalAuth;
pub use client::Client;
pub use config::{SyncConfig, MIN_SYNC_INTERVAL};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use orchestrator::{SyncOrchestrator, SyncState, SyncStats};
pub use transport::{MockTransport, SyncTransport};
