//! Request handlers for the sync endpoints.

use crate::auth::TokenValidator;
use crate::error::{ServerError, ServerResult};
use crate::pipeline::MergePipeline;
use crate::users::UserDirectory;
use keepsync_protocol::{
    decode_records, encode_records, status, AuthRequest, HttpRequest, HttpResponse, Route,
};
use keepsync_store::{RecordStore, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state behind every request.
pub struct HandlerContext {
    /// Authoritative record store.
    pub store: Arc<dyn RecordStore>,
    /// Accounts.
    pub users: Arc<dyn UserDirectory>,
    /// Token issue and verification.
    pub tokens: TokenValidator,
    /// Merge pipeline fed by pushes.
    pub pipeline: Arc<MergePipeline>,
}

impl HandlerContext {
    /// Creates a handler context.
    pub fn new(
        store: Arc<dyn RecordStore>,
        users: Arc<dyn UserDirectory>,
        tokens: TokenValidator,
        pipeline: Arc<MergePipeline>,
    ) -> Self {
        Self {
            store,
            users,
            tokens,
            pipeline,
        }
    }
}

/// Maps requests onto endpoint semantics.
///
/// Handling is synchronous; a push only enqueues onto the pipeline, so
/// [`handle`](Self::handle) must run inside a tokio runtime.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles one request. Errors become status codes.
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        let result = match Route::parse(request.method, &request.path) {
            Some(Route::Ping) => self.handle_ping(),
            Some(Route::Register) => self.handle_register(&request),
            Some(Route::Login) => self.handle_login(&request),
            Some(Route::Pull(since)) => self.handle_pull(&request, since),
            Some(Route::Push) => self.handle_push(request),
            None => Err(ServerError::NotFound(request.path.clone())),
        };

        result.unwrap_or_else(|e| {
            if e.is_server_error() {
                warn!(error = %e, "request failed");
            } else {
                debug!(error = %e, "request rejected");
            }
            HttpResponse::error(e.status_code(), e)
        })
    }

    fn authenticate(&self, request: &HttpRequest) -> ServerResult<String> {
        let token = request
            .token
            .as_deref()
            .ok_or_else(|| ServerError::NotAuthorized("missing token".into()))?;
        self.context.tokens.validate_token(token)
    }

    /// `GET /ping`
    pub fn handle_ping(&self) -> ServerResult<HttpResponse> {
        self.context.store.ping()?;
        Ok(HttpResponse::empty(status::OK))
    }

    /// `POST /api/user/register`
    pub fn handle_register(&self, request: &HttpRequest) -> ServerResult<HttpResponse> {
        let auth = AuthRequest::decode(&request.body)?;
        self.context.users.register(&auth.usr, &auth.pass)?;
        info!(owner = %auth.usr, "user registered");

        let token = self.context.tokens.create_token(&auth.usr)?;
        Ok(HttpResponse::empty(status::OK).with_token(token))
    }

    /// `POST /api/user/login`
    pub fn handle_login(&self, request: &HttpRequest) -> ServerResult<HttpResponse> {
        let auth = AuthRequest::decode(&request.body)?;
        self.context.users.verify(&auth.usr, &auth.pass)?;
        debug!(owner = %auth.usr, "user logged in");

        let token = self.context.tokens.create_token(&auth.usr)?;
        Ok(HttpResponse::empty(status::OK).with_token(token))
    }

    /// `GET /api/user/data/{seconds}`
    pub fn handle_pull(
        &self,
        request: &HttpRequest,
        since: Option<Timestamp>,
    ) -> ServerResult<HttpResponse> {
        let owner = self.authenticate(request)?;
        let since =
            since.ok_or_else(|| ServerError::InvalidRequest("timestamp must be an integer".into()))?;

        let delta = self.context.store.delta(&owner, since)?;
        if delta.is_empty() {
            return Ok(HttpResponse::empty(status::NO_CONTENT));
        }
        debug!(%owner, %since, count = delta.len(), "serving delta");
        Ok(HttpResponse::with_body(status::OK, encode_records(&delta)?))
    }

    /// `POST /api/user/data`
    ///
    /// Records are re-owned to the token's owner, whatever `usr` they carry.
    pub fn handle_push(&self, request: HttpRequest) -> ServerResult<HttpResponse> {
        let owner = self.authenticate(&request)?;
        let mut records = decode_records(&request.body)?;
        for record in &mut records {
            record.owner.clone_from(&owner);
            record.merged = None;
            record.validate()?;
        }

        debug!(%owner, count = records.len(), "accepted push");
        self.context.pipeline.submit(records)?;
        Ok(HttpResponse::empty(status::ACCEPTED))
    }
}
