// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod auth;
pub mod health;
pub mod profile;

use axum::extract::rejection::JsonRejection;
use tracing::info;

use crate::error::AppError;

/// Malformed bodies become a plain 400; the input is never echoed back
pub(crate) fn malformed_body(rejection: JsonRejection) -> AppError {
    info!(status = %rejection.status(), "rejected request body");
    AppError::Invalid("malformed request body".to_string())
}
