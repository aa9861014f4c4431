//! # keepsync Server
//!
//! Authoritative side of keepsync.
//!
//! This crate provides:
//! - Endpoint semantics (ping, register, login, delta pull, batch push)
//! - The merge batch pipeline that applies pushes last-writer-wins
//! - HMAC-SHA256 session tokens and Argon2id password hashes
//!
//! # Architecture
//!
//! A push is authenticated, decoded, re-owned to the token's owner and handed
//! to a [`MergePipeline`]. The pipeline's single consumer task batches
//! records and runs a conditional upsert per record, stamping `merged` on
//! every accepted write. A delta pull simply reads records merged after the
//! client's watermark.
//!
//! ```text
//! push ──▶ producer task ──rendezvous──▶ consumer ──batch──▶ RecordStore
//! pull ─────────────────────────────────────────────────────▶ RecordStore
//! ```
//!
//! The request handler is framework-free: it maps an
//! [`HttpRequest`](keepsync_protocol::HttpRequest) to an
//! [`HttpResponse`](keepsync_protocol::HttpResponse).

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod auth;
mod config;
mod error;
mod handler;
mod pipeline;
mod server;
mod users;

pub use auth::{AuthConfig, TokenValidator};
pub use config::{PasswordParams, PipelineConfig, ServerConfig, MIN_FLUSH_INTERVAL};
pub use error::{PipelineError, PipelineResult, ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use pipeline::{MergePipeline, PipelineState, PipelineStats};
pub use server::SyncServer;
pub use users::{MemoryUserDirectory, UserDirectory};
