// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! `/auth/*` handlers.
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pinboard_common::{LoginRequest, SignupRequest};

use super::malformed_body;
use crate::{auth::AuthOutcome, error::AppError, middleware::CurrentUser, AppState};

/// `POST /auth/signup`: 201 with the new principal and a session cookie
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = body.map_err(malformed_body)?;
    let outcome = state
        .auth
        .register(req, state.csrf_header_value(&headers))
        .await?;
    session_response(&state, StatusCode::CREATED, outcome, true)
}

/// `POST /auth/login`: 204 with a session cookie
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = body.map_err(malformed_body)?;
    let outcome = state
        .auth
        .login(req, state.csrf_header_value(&headers))
        .await?;
    session_response(&state, StatusCode::NO_CONTENT, outcome, false)
}

/// `POST /auth/logout`: revoke the session and expire the cookie
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = state.session_token(&headers).unwrap_or_default();
    let cookie = state.auth.logout(&token);
    tracing::info!(principal_id = principal.id, "logged out");
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie.to_header_value()?)]).into_response())
}

/// `GET /auth/check`: 204 with a live session, 401 otherwise
pub async fn check(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    let token = state
        .session_token(&headers)
        .ok_or(AppError::Unauthenticated)?;
    state.auth.resolve(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build the register/login response. The session already exists, so the
/// cookie goes out even when the rebind failed and the status is 500.
fn session_response(
    state: &AppState,
    status: StatusCode,
    outcome: AuthOutcome,
    with_body: bool,
) -> Result<Response, AppError> {
    let AuthOutcome {
        principal,
        cookie,
        csrf_token,
        rebind,
    } = outcome;

    let headers = cookie.to_header_value().and_then(|cookie| {
        HeaderValue::from_str(&csrf_token)
            .map(|csrf| (cookie, csrf))
            .map_err(|e| AppError::Internal(format!("unrenderable csrf token: {e}")))
    });
    let (cookie_header, csrf_header) = match headers {
        Ok(headers) => headers,
        Err(e) => {
            // no cookie can reach the client, so the session must not outlive this call
            state.auth.logout(&cookie.value);
            return Err(e);
        },
    };

    let mut response = match rebind {
        Ok(()) if with_body => (status, Json(principal.clone())).into_response(),
        Ok(()) => status.into_response(),
        Err(e) => e.into_response(),
    };
    response.headers_mut().append(SET_COOKIE, cookie_header);
    response
        .headers_mut()
        .insert(state.csrf_header.clone(), csrf_header);
    response.extensions_mut().insert(principal);
    Ok(response)
}
