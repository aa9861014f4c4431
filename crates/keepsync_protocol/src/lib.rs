//! # keepsync Protocol
//!
//! Wire types shared by the sync server and client.
//!
//! This crate provides:
//! - [`WireRecord`], the JSON shape of a secret record on the wire
//! - [`AuthRequest`] for register and login bodies
//! - Endpoint paths and status codes ([`endpoints`], [`status`])
//! - [`HttpRequest`]/[`HttpResponse`], a framework-free request exchange
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! On the wire `updated` and `merged` are RFC 3339 strings; everywhere else
//! they are whole seconds. The conversion happens only in [`WireRecord`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod endpoints;
mod error;
mod http;
mod messages;
pub mod status;
mod wire;

pub use endpoints::Route;
pub use error::{ProtocolError, ProtocolResult};
pub use http::{HttpRequest, HttpResponse, Method, TOKEN_COOKIE};
pub use messages::AuthRequest;
pub use wire::{decode_records, encode_records, WireRecord};
