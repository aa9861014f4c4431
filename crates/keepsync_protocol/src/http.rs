//! Framework-free request and response exchange types.
//!
//! A real HTTP adapter maps its framework's request onto [`HttpRequest`],
//! reading the token from the [`TOKEN_COOKIE`] cookie, and writes the
//! [`HttpResponse`] back, setting the cookie when `token` is present.

use crate::status;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// An inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Path, without scheme or host.
    pub path: String,
    /// Session token, if the caller sent one.
    pub token: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// A GET with no body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            token: None,
            body: Vec::new(),
        }
    }

    /// A POST with `body`.
    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            token: None,
            body,
        }
    }

    /// Attaches a session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
    /// Session token to hand to the caller.
    pub token: Option<String>,
}

impl HttpResponse {
    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            token: None,
        }
    }

    /// A response with a body.
    pub fn with_body(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            token: None,
        }
    }

    /// A plain-text error response.
    pub fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self::with_body(status, message.to_string().into_bytes())
    }

    /// Attaches a session token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns true for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::empty(status::OK)
    }
}
