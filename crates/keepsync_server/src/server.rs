//! Main sync server.

use crate::auth::{AuthConfig, TokenValidator};
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler};
use crate::pipeline::{MergePipeline, PipelineStats};
use crate::users::{MemoryUserDirectory, UserDirectory};
use keepsync_protocol::{HttpRequest, HttpResponse};
use keepsync_store::{MemoryRecordStore, RecordStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The sync server.
///
/// Owns the authoritative store, the account directory and the merge
/// pipeline, and answers requests through [`handle`](Self::handle). Wiring it
/// to an actual HTTP listener is left to the embedding application.
///
/// # Example
///
/// ```
/// use keepsync_protocol::HttpRequest;
/// use keepsync_server::{ServerConfig, SyncServer};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let server = SyncServer::with_memory_store(ServerConfig::default()).unwrap();
/// let shutdown = CancellationToken::new();
/// server.start(shutdown.clone()).unwrap();
///
/// let response = server.handle(HttpRequest::get("/ping"));
/// assert_eq!(response.status, 200);
///
/// shutdown.cancel();
/// server.stopped().await;
/// # }
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a server over `store` with an in-memory account directory.
    pub fn new(config: ServerConfig, store: Arc<dyn RecordStore>) -> ServerResult<Self> {
        let users = Arc::new(MemoryUserDirectory::new(config.password)?);
        Ok(Self::with_users(config, store, users))
    }

    /// Creates a server over a fresh [`MemoryRecordStore`].
    pub fn with_memory_store(config: ServerConfig) -> ServerResult<Self> {
        Self::new(config, Arc::new(MemoryRecordStore::new()))
    }

    /// Creates a server with a caller-supplied account directory.
    pub fn with_users(
        config: ServerConfig,
        store: Arc<dyn RecordStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let tokens = TokenValidator::new(
            AuthConfig::new(config.token_secret.clone()).with_expiry(config.token_expiry),
        );
        let pipeline = MergePipeline::new(config.pipeline.clone(), Arc::clone(&store));
        let context = Arc::new(HandlerContext::new(store, users, tokens, pipeline));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Starts the merge pipeline. Pushes are refused until this is called.
    pub fn start(&self, cancel: CancellationToken) -> ServerResult<()> {
        self.context.pipeline.start(cancel)?;
        Ok(())
    }

    /// Waits for the pipeline to drain after the start token is cancelled.
    pub async fn stopped(&self) {
        self.context.pipeline.stopped().await;
    }

    /// Handles one request.
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.handler.handle(request)
    }

    /// The authoritative store.
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.context.store
    }

    /// Merge pipeline counters.
    pub fn pipeline_stats(&self) -> PipelineStats {
        self.context.pipeline.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordParams;
    use keepsync_protocol::{decode_records, encode_records, endpoints, AuthRequest};
    use keepsync_store::{SecretKind, SecretRecord, Timestamp};
    use std::time::Duration;

    fn config() -> ServerConfig {
        ServerConfig::default()
            .with_password_params(PasswordParams::insecure_fast())
            .with_flush_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn server_lifecycle() {
        let server = SyncServer::with_memory_store(config()).unwrap();
        let cancel = CancellationToken::new();
        server.start(cancel.clone()).unwrap();
        cancel.cancel();
        server.stopped().await;

        // A stopped pipeline cannot be restarted
        assert!(server.start(CancellationToken::new()).is_err());
    }

    #[tokio::test]
    async fn full_sync_flow() {
        let server = SyncServer::with_memory_store(config()).unwrap();
        let cancel = CancellationToken::new();
        server.start(cancel.clone()).unwrap();

        // 1. Register
        let body = AuthRequest::new("alice", "pw").encode().unwrap();
        let token = server
            .handle(HttpRequest::post(endpoints::REGISTER, body))
            .token
            .unwrap();

        // 2. Push two records
        let records: Vec<SecretRecord> = ["a", "b"]
            .iter()
            .map(|id| SecretRecord::new("alice", *id, SecretKind::Text, "00", Timestamp::from_secs(5)))
            .collect();
        let resp = server.handle(
            HttpRequest::post(endpoints::DATA, encode_records(&records).unwrap())
                .with_token(token.clone()),
        );
        assert_eq!(resp.status, 202);

        // 3. Wait for the merge
        for _ in 0..250 {
            if server.pipeline_stats().records_written == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(server.pipeline_stats().records_written, 2);

        // 4. Pull everything; then pull since the watermark and get nothing
        let resp = server.handle(
            HttpRequest::get(endpoints::data_since(Timestamp::ZERO)).with_token(token.clone()),
        );
        let pulled = decode_records(&resp.body).unwrap();
        assert_eq!(pulled.len(), 2);

        let watermark = server.store().watermark("alice").unwrap();
        let resp = server
            .handle(HttpRequest::get(endpoints::data_since(watermark)).with_token(token));
        assert_eq!(resp.status, 204);

        cancel.cancel();
        server.stopped().await;
    }
}
