//! Local half of login: key derivation and the offline verifier.

use crate::error::{SyncError, SyncResult};
use keepsync_crypto::{CryptoSession, SecretKey};
use keepsync_store::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Derives crypto sessions and checks passwords without the server.
///
/// An online login stores the user's identity sealed under their derived key
/// as a verifier. An offline login derives the key again and succeeds only if
/// that key opens the verifier back to the same identity.
pub struct LocalAuth {
    credentials: Arc<dyn CredentialStore>,
    session_timeout: Duration,
    offline_delay: Duration,
}

impl LocalAuth {
    /// Creates local auth over a credential table.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        session_timeout: Duration,
        offline_delay: Duration,
    ) -> Self {
        Self {
            credentials,
            session_timeout,
            offline_delay,
        }
    }

    fn derive(&self, usr: &str, pass: &str) -> CryptoSession {
        CryptoSession::new(SecretKey::derive(usr, pass), self.session_timeout)
    }

    /// Bookkeeping after the server accepted the credentials.
    ///
    /// Replaces any previous verifier for `usr`.
    pub fn login_online(&self, usr: &str, pass: &str) -> SyncResult<CryptoSession> {
        let mut session = self.derive(usr, pass);
        let verifier = session.encrypt(usr)?;
        self.credentials.save_credential(usr, &verifier)?;
        debug!(owner = %usr, "offline verifier updated");
        Ok(session)
    }

    /// Checks credentials against the stored verifier.
    ///
    /// Always waits the configured delay first, whether or not a verifier
    /// exists.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if there is no verifier for `usr` or the derived
    /// key does not open it.
    pub async fn login_offline(&self, usr: &str, pass: &str) -> SyncResult<CryptoSession> {
        let mut session = self.derive(usr, pass);
        tokio::time::sleep(self.offline_delay).await;

        let verifier = self
            .credentials
            .load_credential(usr)?
            .ok_or(SyncError::InvalidCredentials)?;

        match session.decrypt(&verifier) {
            Ok(identity) if identity == usr => Ok(session),
            _ => Err(SyncError::InvalidCredentials),
        }
    }
}

impl std::fmt::Debug for LocalAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuth")
            .field("session_timeout", &self.session_timeout)
            .field("offline_delay", &self.offline_delay)
            .finish_non_exhaustive()
    }
}
