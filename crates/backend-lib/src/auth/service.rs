use async_trait::async_trait;
use pinboard_common::{LoginRequest, Principal, PrincipalId, SignupRequest};

use super::{Session, SessionCookie};
use crate::error::AppError;

/// What a successful register or login hands back to the HTTP layer
#[derive(Debug)]
pub struct AuthOutcome {
    pub principal: Principal,
    /// Cookie for the session that was just stored
    pub cookie: SessionCookie,
    /// CSRF token bound to the new session
    pub csrf_token: String,
    /// Outcome of rebinding the notification token. The session stands
    /// either way.
    pub rebind: Result<(), AppError>,
}

/// Auth facade: the only entry point handlers use for sessions and credentials
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a user and log them in. `csrf_token` is the request's
    /// `X-CSRF-Token` header, if any.
    async fn register(
        &self,
        req: SignupRequest,
        csrf_token: Option<String>,
    ) -> Result<AuthOutcome, AppError>;

    async fn login(
        &self,
        req: LoginRequest,
        csrf_token: Option<String>,
    ) -> Result<AuthOutcome, AppError>;

    /// Revoke a session. Unknown tokens are fine; the expired cookie is
    /// returned either way.
    fn logout(&self, token: &str) -> SessionCookie;

    /// Session behind a cookie value, `Unauthenticated` if there is none
    fn resolve(&self, token: &str) -> Result<Session, AppError>;

    /// `NotFound` for an unknown username, `Unauthenticated` for a wrong password
    async fn check_credentials(&self, username: &str, password: &str)
        -> Result<Principal, AppError>;

    /// Delete the user and every session they hold
    async fn revoke_principal(&self, principal_id: PrincipalId) -> Result<SessionCookie, AppError>;

    fn cookie_name(&self) -> &str;
}
