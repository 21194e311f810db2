// ============================
// crates/backend-lib/src/auth/cookie.rs
// ============================
//! Session cookies: minting, rendering and reading them back.
use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};

use super::token_generator::generate_secure_token_with_size;
use crate::config::{Settings, MAX_SESSION_LIFETIME_SECS};
use crate::error::AppError;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
        }
    }
}

/// A cookie ready to be sent in a `Set-Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub expires: DateTime<Utc>,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value
    pub fn to_header_value(&self) -> Result<HeaderValue, AppError> {
        let mut cookie = format!(
            "{}={}; Path={}; Expires={}",
            self.name,
            self.value,
            self.path,
            self.expires.format(HTTP_DATE_FORMAT)
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.same_site.as_str());
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("unrenderable cookie: {e}")))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Produces session cookies carrying fresh random tokens
#[derive(Debug, Clone)]
pub struct CookieMinter {
    name: String,
    token_bytes: usize,
    lifetime: Duration,
    secure: bool,
}

impl CookieMinter {
    pub fn new(name: impl Into<String>, token_bytes: usize, lifetime: Duration, secure: bool) -> Self {
        Self {
            name: name.into(),
            token_bytes,
            lifetime,
            secure,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let secs = settings.session.lifetime_secs.min(MAX_SESSION_LIFETIME_SECS);
        let lifetime = Duration::seconds(secs as i64);
        Self::new(
            settings.session.cookie_name.clone(),
            settings.session.token_bytes,
            lifetime,
            settings.tls.enabled,
        )
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    /// A new session cookie expiring `lifetime` from now
    pub fn mint(&self) -> Result<SessionCookie, AppError> {
        let value = generate_secure_token_with_size(self.token_bytes)?;
        Ok(self.cookie(value, Utc::now() + self.lifetime))
    }

    /// Cookie instructing the client to discard its session cookie
    pub fn expired(&self) -> SessionCookie {
        self.cookie(String::new(), Utc::now() - Duration::days(1))
    }

    fn cookie(&self, value: String, expires: DateTime<Utc>) -> SessionCookie {
        SessionCookie {
            name: self.name.clone(),
            value,
            expires,
            path: "/".to_string(),
            http_only: true,
            secure: self.secure,
            same_site: SameSite::Lax,
        }
    }
}

/// Read a cookie value from the request headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == name {
                let val = val.trim();
                if val.is_empty() {
                    return None;
                }
                return Some(val.to_string());
            }
        }
    }
    None
}
