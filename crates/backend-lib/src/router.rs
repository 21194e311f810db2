// ============================
// crates/backend-lib/src/router.rs
// ============================
//! Route table and middleware stack.
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{auth, health::health, profile::delete_profile},
    middleware::{
        csrf_gate, json_content_type, panic_guard, require_anonymous, require_auth,
        track_requests,
    },
    websocket::ws_handler,
    AppState,
};

/// Build the application router.
///
/// Outermost first: panic guard, tracing, request tracking, CSRF gate (when
/// enabled), then the per-route auth gate and the JSON content type.
pub fn create_router(state: AppState) -> Router {
    let anonymous = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .layer(from_fn(json_content_type))
        .route_layer(from_fn_with_state(state.clone(), require_anonymous));

    let authenticated = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/profile", delete(delete_profile))
        .layer(from_fn(json_content_type))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let mut router = Router::new()
        .route("/auth/check", get(auth::check))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .merge(anonymous)
        .merge(authenticated);

    if state.settings.csrf.enabled {
        router = router.layer(from_fn_with_state(state.clone(), csrf_gate));
    }

    router
        .layer(from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(panic_guard())
        .with_state(state)
}
