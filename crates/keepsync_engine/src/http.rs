//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the engine can
//! run over reqwest, hyper, or the in-process [`LoopbackClient`] used in
//! tests.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use async_trait::async_trait;
use keepsync_protocol::{
    decode_records, encode_records, endpoints, status, AuthRequest, HttpRequest, HttpResponse,
};
use keepsync_store::{SecretRecord, Timestamp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. A returned
/// `Err` means the request never got a response (connection refused, DNS,
/// timeout); any status code, including 5xx, is an `Ok`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends one request and waits for the response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// HTTP-based sync transport.
///
/// Every call is preceded by a `GET /ping`; a failed ping short-circuits the
/// call with [`SyncError::Unavailable`].
pub struct HttpTransport<C: HttpClient> {
    client: C,
    /// Outcome of the most recent ping.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(client: C) -> Self {
        Self {
            client,
            connected: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns true if the most recent ping succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn unavailable(&self, err: String) -> SyncError {
        self.set_error(&err);
        self.connected.store(false, Ordering::SeqCst);
        SyncError::Unavailable(err)
    }

    /// Checks that the remote answers `GET /ping` with 200.
    pub async fn ping(&self) -> SyncResult<()> {
        match self.client.send(HttpRequest::get(endpoints::PING)).await {
            Ok(response) if response.status == status::OK => {
                self.connected.store(true, Ordering::SeqCst);
                self.clear_error();
                Ok(())
            }
            Ok(response) => Err(self.unavailable(format!("ping returned {}", response.status))),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn exchange(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        self.ping().await?;
        debug!(path = %request.path, "sending request");
        self.client
            .send(request)
            .await
            .map_err(|e| self.unavailable(e))
    }

    async fn authenticate(&self, path: &str, usr: &str, pass: &str) -> SyncResult<String> {
        let body = AuthRequest::new(usr, pass).encode()?;
        let response = self.exchange(HttpRequest::post(path, body)).await?;
        match response.status {
            status::OK => response
                .token
                .ok_or_else(|| SyncError::Protocol("response carried no token".into())),
            status::CONFLICT => Err(SyncError::AlreadyExists(usr.to_string())),
            status::UNAUTHORIZED => Err(SyncError::InvalidCredentials),
            _ => Err(status_error(&response)),
        }
    }
}

/// Maps a status with no endpoint-specific meaning.
fn status_error(response: &HttpResponse) -> SyncError {
    match response.status {
        status::BAD_REQUEST => SyncError::InvalidArgument(response.text()),
        status::UNAUTHORIZED => SyncError::SessionExpired,
        s if s >= status::INTERNAL_SERVER_ERROR => {
            SyncError::Unavailable(format!("remote returned {s}: {}", response.text()))
        }
        s => SyncError::Protocol(format!("unexpected status {s}")),
    }
}

#[async_trait]
impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    async fn register(&self, usr: &str, pass: &str) -> SyncResult<String> {
        self.authenticate(endpoints::REGISTER, usr, pass).await
    }

    async fn login(&self, usr: &str, pass: &str) -> SyncResult<String> {
        self.authenticate(endpoints::LOGIN, usr, pass).await
    }

    async fn download(&self, token: &str, since: Timestamp) -> SyncResult<Vec<SecretRecord>> {
        let request = HttpRequest::get(endpoints::data_since(since)).with_token(token);
        let response = self.exchange(request).await?;
        match response.status {
            status::OK => Ok(decode_records(&response.body)?),
            status::NO_CONTENT => Ok(Vec::new()),
            _ => Err(status_error(&response)),
        }
    }

    async fn upload(&self, token: &str, records: &[SecretRecord]) -> SyncResult<()> {
        let request =
            HttpRequest::post(endpoints::DATA, encode_records(records)?).with_token(token);
        let response = self.exchange(request).await?;
        match response.status {
            status::ACCEPTED => Ok(()),
            _ => Err(status_error(&response)),
        }
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request.
    fn handle(&self, request: HttpRequest) -> HttpResponse;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle(&self, request: HttpRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead. The client can be
/// switched unreachable to simulate losing the network.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    reachable: AtomicBool,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self {
            server,
            reachable: AtomicBool::new(true),
        }
    }

    /// Makes every request fail as if the network were down while `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Returns the server behind this client.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        Ok(self.server.handle(request))
    }
}
