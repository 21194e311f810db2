// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Session and authentication core of the Pinboard HTTP backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notifications;
pub mod router;
pub mod storage;
pub mod validation;
pub mod websocket;

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};

use crate::auth::{read_cookie, AuthService, CsrfTokens, DefaultAuth, SessionManager, StaticCsrfKey};
use crate::config::Settings;
use crate::error::AppError;
use crate::notifications::{ChangeToken, NotificationHub};
use crate::storage::UserStore;

pub use crate::router::create_router;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication facade
    pub auth: Arc<dyn AuthService>,
    /// Session store, shared with `auth`
    pub sessions: SessionManager,
    pub settings: Arc<Settings>,
    pub users: Arc<dyn UserStore>,
    /// Websocket connections and notification-token bindings
    pub notifications: Arc<NotificationHub>,
    pub csrf: Arc<CsrfTokens>,
    /// Header carrying CSRF tokens in both directions
    pub csrf_header: HeaderName,
}

impl AppState {
    /// Create a new application state. The notification hub doubles as the
    /// token rebinder.
    pub fn new(users: Arc<dyn UserStore>, settings: Settings) -> Result<Self, AppError> {
        let hub = Arc::new(NotificationHub::new());
        let notifier: Arc<dyn ChangeToken> = hub.clone();
        Self::with_notifier(users, settings, hub, notifier)
    }

    /// Create a state with a custom token rebinder
    pub fn with_notifier(
        users: Arc<dyn UserStore>,
        settings: Settings,
        notifications: Arc<NotificationHub>,
        notifier: Arc<dyn ChangeToken>,
    ) -> Result<Self, AppError> {
        settings.validate()?;
        let csrf_header = HeaderName::from_bytes(settings.csrf.header.as_bytes())
            .map_err(|e| AppError::Invalid(format!("csrf.header: {e}")))?;

        let sessions = SessionManager::new();
        let auth = Arc::new(DefaultAuth::new(
            users.clone(),
            sessions.clone(),
            notifier,
            &settings,
        ));
        let csrf = Arc::new(CsrfTokens::new(Box::new(StaticCsrfKey::new(
            settings.csrf.key.as_bytes().to_vec(),
        ))));

        Ok(Self {
            auth,
            sessions,
            settings: Arc::new(settings),
            users,
            notifications,
            csrf,
            csrf_header,
        })
    }

    /// Session token from the request's session cookie
    pub fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, self.auth.cookie_name())
    }

    /// Value of the CSRF header, if present and readable
    pub fn csrf_header_value(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.csrf_header)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}
