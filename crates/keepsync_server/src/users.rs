//! User accounts.

use crate::config::PasswordParams;
use crate::error::{ServerError, ServerResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Account registration and password checks.
pub trait UserDirectory: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// `UserExists` if the identity is taken.
    fn register(&self, usr: &str, pass: &str) -> ServerResult<()>;

    /// Checks a password.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` for an unknown identity or a wrong password.
    fn verify(&self, usr: &str, pass: &str) -> ServerResult<()>;
}

/// In-memory accounts with Argon2id PHC hashes.
pub struct MemoryUserDirectory {
    hasher: Argon2<'static>,
    users: RwLock<HashMap<String, String>>,
}

impl MemoryUserDirectory {
    /// Creates an empty directory hashing with `params`.
    ///
    /// # Errors
    ///
    /// `Internal` if Argon2 rejects the parameters.
    pub fn new(params: PasswordParams) -> ServerResult<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| ServerError::Internal(format!("argon2 params: {e}")))?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            users: RwLock::new(HashMap::new()),
        })
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns true if nobody has registered.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn hash(&self, pass: &str) -> ServerResult<String> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| ServerError::Internal(format!("salt: {e}")))?;

        self.hasher
            .hash_password(pass.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServerError::Internal(format!("hashing failed: {e}")))
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn register(&self, usr: &str, pass: &str) -> ServerResult<()> {
        // Hash outside the lock; it's the slow part.
        let phc = self.hash(pass)?;

        match self.users.write().entry(usr.to_string()) {
            Entry::Occupied(_) => Err(ServerError::UserExists(usr.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(phc);
                Ok(())
            }
        }
    }

    fn verify(&self, usr: &str, pass: &str) -> ServerResult<()> {
        let phc = self
            .users
            .read()
            .get(usr)
            .cloned()
            .ok_or_else(|| ServerError::NotAuthorized("unknown user or wrong password".into()))?;

        let parsed = PasswordHash::new(&phc)
            .map_err(|e| ServerError::Internal(format!("stored hash unreadable: {e}")))?;

        self.hasher
            .verify_password(pass.as_bytes(), &parsed)
            .map_err(|_| ServerError::NotAuthorized("unknown user or wrong password".into()))
    }
}

impl std::fmt::Debug for MemoryUserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUserDirectory")
            .field("users", &self.len())
            .finish_non_exhaustive()
    }
}
