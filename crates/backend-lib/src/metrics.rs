// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const HTTP_REQUESTS: &str = "http.requests";
pub const HTTP_REQUEST_DURATION: &str = "http.request.duration";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_REVOKED: &str = "session.revoked";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const AUTH_LOGIN_FAILED: &str = "auth.login.failed";
pub const AUTH_REGISTER_ROLLED_BACK: &str = "auth.register.rolled_back";
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_ACTIVE: &str = "ws.active";
