// crates/backend-lib/src/middleware/csrf.rs

//! CSRF gate.
//!
//! State-changing requests must echo the expected token in the CSRF header:
//! the session's token when a session exists, otherwise the signed anonymous
//! token from the CSRF cookie. Every response carries the token to use next.
use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use tracing::{error, info};

use crate::{
    auth::{read_cookie, tokens_match, SameSite, SessionCookie},
    error::AppError,
    AppState,
};

pub async fn csrf_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let session_token = state.session_token(headers);
    let anonymous = read_cookie(headers, &state.settings.csrf.cookie_name)
        .filter(|token| state.csrf.verify_anonymous(token));
    let expected = session_token
        .as_deref()
        .and_then(|t| state.sessions.csrf_token(t))
        .or_else(|| anonymous.clone());

    let mut response = if request.method().is_safe() {
        next.run(request).await
    } else {
        let provided = state.csrf_header_value(request.headers());
        match (expected.as_deref(), provided.as_deref()) {
            (Some(expected), Some(provided)) if tokens_match(expected, provided) => {
                next.run(request).await
            },
            _ => {
                info!(method = %request.method(), uri = %request.uri(), "csrf check failed");
                AppError::Forbidden("csrf token missing or mismatched".to_string()).into_response()
            },
        }
    };

    if !response.headers().contains_key(&state.csrf_header) {
        if let Err(e) = attach_token(&state, session_token.as_deref(), anonymous, &mut response) {
            error!(error = %e, "failed to attach csrf token");
        }
    }
    response
}

/// Put the token for the client's next unsafe request on the response,
/// issuing an anonymous one (and its cookie) when there is none
fn attach_token(
    state: &AppState,
    session_token: Option<&str>,
    anonymous: Option<String>,
    response: &mut Response,
) -> Result<(), AppError> {
    // the handler may have just ended the session
    let token = match session_token.and_then(|t| state.sessions.csrf_token(t)) {
        Some(token) => token,
        None => match anonymous {
            Some(token) => token,
            None => {
                let token = state.csrf.issue_anonymous()?;
                let cookie = anonymous_cookie(state, &token).to_header_value()?;
                response.headers_mut().append(SET_COOKIE, cookie);
                token
            },
        },
    };

    let value = HeaderValue::from_str(&token)
        .map_err(|e| AppError::Internal(format!("unrenderable csrf token: {e}")))?;
    response
        .headers_mut()
        .insert(state.csrf_header.clone(), value);
    Ok(())
}

fn anonymous_cookie(state: &AppState, token: &str) -> SessionCookie {
    SessionCookie {
        name: state.settings.csrf.cookie_name.clone(),
        value: token.to_string(),
        expires: Utc::now() + Duration::seconds(state.settings.session_lifetime().as_secs() as i64),
        path: "/".to_string(),
        http_only: true,
        secure: state.settings.tls.enabled,
        same_site: SameSite::Strict,
    }
}
