// crates/backend-lib/src/middleware/auth.rs

//! Route-level authentication gates and the typed principal accessor.
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use pinboard_common::Principal;
use tracing::debug;

use crate::{error::AppError, AppState};

/// Require a live session. The principal is put into the request (and
/// response) extensions for the handler and the request log.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = state
        .session_token(request.headers())
        .ok_or(AppError::Unauthenticated)?;
    let session = state.auth.resolve(&token)?;

    let principal = session.principal;
    request.extensions_mut().insert(principal.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(principal);
    Ok(response)
}

/// Forbid requests that already carry a live session
pub async fn require_anonymous(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = state.session_token(request.headers()) {
        if let Ok(session) = state.auth.resolve(&token) {
            debug!(principal_id = session.principal.id, "authenticated request on anonymous route");
            return Err(AppError::Forbidden("already authenticated".to_string()));
        }
    }
    // nothing upstream may leak an identity into an anonymous handler
    request.extensions_mut().remove::<Principal>();
    Ok(next.run(request).await)
}

/// Principal attached by `require_auth`, if any
pub fn principal_from(parts: &Parts) -> Option<&Principal> {
    parts.extensions.get::<Principal>()
}

/// Extractor for the authenticated principal. Only valid behind
/// `require_auth`; elsewhere it rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from(parts)
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}
