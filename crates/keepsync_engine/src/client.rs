//! Client facade: login, local entries, and the two sync legs.

use crate::auth::LocalAuth;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use keepsync_crypto::CryptoSession;
use keepsync_store::payload::Payload;
use keepsync_store::{
    Clock, CredentialStore, RecordStore, RecordSummary, SecretRecord, SystemClock,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A logged-in user.
struct Session {
    owner: String,
    /// Server token; `None` for an offline login.
    token: Option<String>,
    token_issued: Instant,
    crypto: CryptoSession,
}

/// The client side of keepsync.
///
/// Owns the local store and at most one session. Entries are sealed under the
/// session's crypto key and stored unmerged; an online session pushes them
/// right away and reads them back after
/// [`readback_delay`](SyncConfig::readback_delay).
///
/// Local store mutations from user entries and from applying downloads are
/// serialized through one write gate.
pub struct Client {
    config: SyncConfig,
    store: Arc<dyn RecordStore>,
    auth: LocalAuth,
    transport: Arc<dyn SyncTransport>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<Session>>,
    write_gate: Mutex<()>,
}

impl Client {
    /// Creates a client over separate record and credential stores.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn RecordStore>,
        credentials: Arc<dyn CredentialStore>,
        transport: Arc<dyn SyncTransport>,
    ) -> Self {
        let auth = LocalAuth::new(
            credentials,
            config.session_timeout,
            config.offline_login_delay,
        );
        Self {
            config,
            store,
            auth,
            transport,
            clock: Arc::new(SystemClock),
            session: Mutex::new(None),
            write_gate: Mutex::new(()),
        }
    }

    /// Creates a client over one store that keeps both records and verifiers.
    pub fn with_store<S>(config: SyncConfig, store: Arc<S>, transport: Arc<dyn SyncTransport>) -> Self
    where
        S: RecordStore + CredentialStore + 'static,
    {
        Self::new(config, store.clone(), store, transport)
    }

    /// Stamps entries with `clock` instead of wall-clock time.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Identity of the logged-in user.
    pub fn owner(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.owner.clone())
    }

    /// Returns true if a user is logged in.
    pub fn is_logged_in(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Returns true if the session holds a server token.
    pub fn is_online(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.token.is_some())
    }

    /// Ends the session. Local data stays.
    pub fn logout(&self) {
        if let Some(session) = self.session.lock().take() {
            info!(owner = %session.owner, "logged out");
        }
    }

    fn begin(&self, owner: &str, token: Option<String>, crypto: CryptoSession) {
        *self.session.lock() = Some(Session {
            owner: owner.to_string(),
            token,
            token_issued: Instant::now(),
            crypto,
        });
    }

    fn check_credentials(usr: &str, pass: &str) -> SyncResult<()> {
        if usr.is_empty() || pass.is_empty() {
            return Err(SyncError::InvalidArgument(
                "identity and password must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Creates a remote account and logs in online.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the identity is taken, `Unavailable` if the remote
    /// cannot be reached. Registration never falls back to offline.
    pub async fn register(&self, usr: &str, pass: &str) -> SyncResult<()> {
        Self::check_credentials(usr, pass)?;
        let token = self.transport.register(usr, pass).await?;
        let crypto = self.auth.login_online(usr, pass)?;
        self.begin(usr, Some(token), crypto);
        info!(owner = %usr, "registered");
        Ok(())
    }

    /// Logs in, online if the remote is reachable, otherwise offline.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for any rejected login, online or offline.
    pub async fn login(&self, usr: &str, pass: &str) -> SyncResult<()> {
        Self::check_credentials(usr, pass)?;
        match self.transport.login(usr, pass).await {
            Ok(token) => {
                let crypto = self.auth.login_online(usr, pass)?;
                self.begin(usr, Some(token), crypto);
                info!(owner = %usr, "logged in online");
            }
            Err(SyncError::Unavailable(reason)) => {
                info!(owner = %usr, %reason, "remote unavailable, trying offline login");
                let crypto = self.auth.login_offline(usr, pass).await?;
                self.begin(usr, None, crypto);
                info!(owner = %usr, "logged in offline");
            }
            Err(e) => {
                debug!(owner = %usr, error = %e, "remote login rejected");
                return Err(SyncError::InvalidCredentials);
            }
        }
        Ok(())
    }

    /// Owner and, for an online session, a token that has not expired.
    fn credentials(&self) -> SyncResult<(String, Option<String>)> {
        let guard = self.session.lock();
        let session = guard.as_ref().ok_or(SyncError::SessionExpired)?;
        if session.token.is_some() && session.token_issued.elapsed() > self.config.token_expiry {
            return Err(SyncError::SessionExpired);
        }
        Ok((session.owner.clone(), session.token.clone()))
    }

    fn online_credentials(&self) -> SyncResult<(String, String)> {
        match self.credentials()? {
            (owner, Some(token)) => Ok((owner, token)),
            (_, None) => Err(SyncError::Unavailable("session is offline".into())),
        }
    }

    /// Seals and stores a new entry.
    ///
    /// When online, pushes the entry, waits the read-back delay and downloads.
    /// A remote that is unavailable at that point is logged and ignored; the
    /// entry stays unmerged until the next cycle.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or an invalid payload,
    /// `AlreadyExists` for a taken id, `SessionExpired` if the crypto session
    /// or the token has expired.
    pub async fn enter(&self, id: &str, payload: &Payload) -> SyncResult<()> {
        if id.is_empty() {
            return Err(SyncError::InvalidArgument("id must not be empty".into()));
        }
        payload.validate()?;
        let plaintext = payload.to_json()?;

        let (owner, token, data) = {
            let mut guard = self.session.lock();
            let session = guard.as_mut().ok_or(SyncError::SessionExpired)?;
            let data = session.crypto.encrypt(&plaintext)?;
            (session.owner.clone(), session.token.clone(), data)
        };

        let record = SecretRecord::new(&owner, id, payload.kind(), data, self.clock.now());
        {
            let _gate = self.write_gate.lock();
            self.store.insert_entry(record)?;
        }
        info!(%owner, %id, kind = %payload.kind(), "entry stored");

        if token.is_some() {
            match self.readback().await {
                Ok(()) => {}
                Err(SyncError::SessionExpired) => return Err(SyncError::SessionExpired),
                Err(e) if e.is_transient() => info!(error = %e, "read-back skipped"),
                Err(e) => warn!(error = %e, "read-back failed"),
            }
        }
        Ok(())
    }

    /// Upload, wait, download.
    async fn readback(&self) -> SyncResult<()> {
        self.upload().await?;
        tokio::time::sleep(self.config.readback_delay).await;
        self.download().await?;
        Ok(())
    }

    /// Opens one entry.
    ///
    /// # Errors
    ///
    /// `SessionExpired` if the crypto session or the token has expired,
    /// `InvalidArgument` if there is no such entry.
    pub fn reveal(&self, id: &str) -> SyncResult<Payload> {
        let (owner, _) = self.credentials()?;
        let record = self
            .store
            .get(&owner, id)?
            .ok_or_else(|| SyncError::InvalidArgument(format!("no entry {id:?}")))?;

        let plaintext = {
            let mut guard = self.session.lock();
            let session = guard.as_mut().ok_or(SyncError::SessionExpired)?;
            session.crypto.decrypt(&record.data)?
        };
        Ok(Payload::from_json(record.kind, &plaintext)?)
    }

    /// Lists the logged-in user's entries.
    pub fn index(&self) -> SyncResult<Vec<RecordSummary>> {
        let (owner, _) = self.credentials()?;
        Ok(self.store.index(&owner)?)
    }

    /// Pulls everything merged since the local watermark and applies it.
    ///
    /// Returns the number of records applied.
    pub async fn download(&self) -> SyncResult<usize> {
        let (owner, token) = self.online_credentials()?;
        let since = self.store.watermark(&owner)?;
        let records = self.transport.download(&token, since).await?;
        if records.is_empty() {
            return Ok(0);
        }

        let count = {
            let _gate = self.write_gate.lock();
            self.store.apply_authoritative_many(records)?
        };
        debug!(%owner, %since, count, "applied delta");
        Ok(count)
    }

    /// Pushes every local record that is still unmerged.
    ///
    /// Pushed records stay unmerged locally until a download brings back the
    /// server's copy. Returns the number of records pushed.
    pub async fn upload(&self) -> SyncResult<usize> {
        let (owner, token) = self.online_credentials()?;
        let unmerged = self.store.unmerged(&owner)?;
        if unmerged.is_empty() {
            return Ok(0);
        }

        self.transport.upload(&token, &unmerged).await?;
        debug!(%owner, count = unmerged.len(), "pushed unmerged");
        Ok(unmerged.len())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("owner", &self.owner())
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}
