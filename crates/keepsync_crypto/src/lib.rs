//! # keepsync Crypto
//!
//! The crypto session gate decides whether a secret may currently be sealed
//! or opened.
//!
//! ## Security Model
//!
//! - Keys are derived deterministically from `identity ‖ secret` with SHA-256,
//!   so the same credentials always yield the same key
//! - Payloads are sealed with AES-256-GCM and a fresh random nonce per call
//! - Sealed payloads are hex text: `hex(nonce ‖ ciphertext ‖ tag)`
//! - A [`CryptoSession`] refuses to work once it has been idle longer than
//!   its timeout; every successful operation resets the idle timer
//! - Keys are zeroized on drop and never printed
//!
//! ## Usage
//!
//! ```rust
//! use keepsync_crypto::CryptoSession;
//!
//! let mut session = CryptoSession::derive("alice@example.com", "hunter2");
//! let sealed = session.encrypt("{\"login\":\"alice\"}").unwrap();
//! let opened = session.decrypt(&sealed).unwrap();
//! assert_eq!(opened, "{\"login\":\"alice\"}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cipher;
mod error;
mod key;
mod session;

pub use cipher::{open, seal, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{SecretKey, KEY_SIZE};
pub use session::{CryptoSession, DEFAULT_SESSION_TIMEOUT};
