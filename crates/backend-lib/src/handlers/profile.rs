// ============================
// crates/backend-lib/src/handlers/profile.rs
// ============================
use axum::{
    extract::State,
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{error::AppError, middleware::CurrentUser, AppState};

/// `DELETE /profile`: remove the account and end every session it holds
pub async fn delete_profile(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Response, AppError> {
    let cookie = state.auth.revoke_principal(principal.id).await?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cookie.to_header_value()?)]).into_response())
}
