//! Endpoint paths and routing.

use crate::http::Method;
use keepsync_store::Timestamp;

/// Liveness probe.
pub const PING: &str = "/ping";
/// Account creation.
pub const REGISTER: &str = "/api/user/register";
/// Authentication.
pub const LOGIN: &str = "/api/user/login";
/// Batch push; with a `/{seconds}` suffix, delta pull.
pub const DATA: &str = "/api/user/data";

/// Path of a delta pull since `since`.
pub fn data_since(since: Timestamp) -> String {
    format!("{DATA}/{}", since.as_secs())
}

/// A recognised endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /ping`
    Ping,
    /// `POST /api/user/register`
    Register,
    /// `POST /api/user/login`
    Login,
    /// `GET /api/user/data/{seconds}`; `None` when the suffix isn't an integer.
    Pull(Option<Timestamp>),
    /// `POST /api/user/data`
    Push,
}

impl Route {
    /// Matches a method and path. A trailing query string is ignored.
    pub fn parse(method: Method, path: &str) -> Option<Route> {
        let path = path.split('?').next().unwrap_or(path);
        match (method, path) {
            (Method::Get, PING) => Some(Route::Ping),
            (Method::Post, REGISTER) => Some(Route::Register),
            (Method::Post, LOGIN) => Some(Route::Login),
            (Method::Post, DATA) => Some(Route::Push),
            (Method::Get, p) => {
                let suffix = p.strip_prefix(DATA)?.strip_prefix('/')?;
                Some(Route::Pull(
                    suffix.parse::<i64>().ok().map(Timestamp::from_secs),
                ))
            }
            _ => None,
        }
    }
}
