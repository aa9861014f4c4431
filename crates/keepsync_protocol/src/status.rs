//! HTTP status codes used by the endpoints.

/// Request served.
pub const OK: u16 = 200;
/// Push accepted for merging.
pub const ACCEPTED: u16 = 202;
/// Delta pull found nothing new.
pub const NO_CONTENT: u16 = 204;
/// Malformed request.
pub const BAD_REQUEST: u16 = 400;
/// Missing, invalid or expired token; or wrong credentials.
pub const UNAUTHORIZED: u16 = 401;
/// Unknown route.
pub const NOT_FOUND: u16 = 404;
/// Identity already registered.
pub const CONFLICT: u16 = 409;
/// Server-side failure.
pub const INTERNAL_SERVER_ERROR: u16 = 500;
/// Server is shutting down or its pipeline is not running.
pub const SERVICE_UNAVAILABLE: u16 = 503;
