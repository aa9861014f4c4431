//! Authentication request body.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Body of `register` and `login` requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Identity.
    pub usr: String,
    /// Password.
    pub pass: String,
}

impl AuthRequest {
    /// Creates a request.
    pub fn new(usr: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            usr: usr.into(),
            pass: pass.into(),
        }
    }

    /// Encodes as JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes and checks that neither field is empty.
    pub fn decode(body: &[u8]) -> ProtocolResult<Self> {
        let req: AuthRequest = serde_json::from_slice(body)?;
        if req.usr.is_empty() {
            return Err(ProtocolError::invalid_field("usr", "empty"));
        }
        if req.pass.is_empty() {
            return Err(ProtocolError::invalid_field("pass", "empty"));
        }
        Ok(req)
    }
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("usr", &self.usr)
            .field("pass", &"[REDACTED]")
            .finish()
    }
}
