// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::AppError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound on `session.lifetime_secs` (one year)
pub const MAX_SESSION_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub session: SessionSettings,
    pub csrf: CsrfSettings,
    pub tls: TlsSettings,
    pub kdf: KdfSettings,
    pub deadlines: DeadlineSettings,
    pub log: LogSettings,
}

/// Listener and storage location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Root directory of the flat-file user store
    pub data_dir: PathBuf,
}

/// Session cookie and store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Random bytes per session token
    pub token_bytes: usize,
    pub lifetime_secs: u64,
    /// How often the background sweep drops expired sessions
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    pub enabled: bool,
    /// Request and response header carrying the token
    pub header: String,
    /// Cookie holding the anonymous (pre-login) token
    pub cookie_name: String,
    /// HMAC key for anonymous tokens
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    pub enabled: bool,
}

/// Password hashing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgo {
    Scrypt,
    Argon2,
}

/// Password KDF settings. `cost` is `log_n` for scrypt and the iteration
/// count (`t_cost`) for argon2.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KdfSettings {
    pub algo: KdfAlgo,
    pub cost: u32,
}

/// Overall deadlines for the register and login flows
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeadlineSettings {
    pub register_ms: u64,
    pub login_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "session_id".to_string(),
            token_bytes: 40,
            lifetime_secs: 10 * 60 * 60, // 10 hours
            cleanup_interval_secs: 15 * 60,
        }
    }
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            header: "X-CSRF-Token".to_string(),
            cookie_name: "csrf_token".to_string(),
            key: String::new(),
        }
    }
}

impl Default for KdfSettings {
    fn default() -> Self {
        Self {
            algo: KdfAlgo::Scrypt,
            cost: 15,
        }
    }
}

impl Default for DeadlineSettings {
    fn default() -> Self {
        Self {
            register_ms: 5_000,
            login_ms: 5_000,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Address the HTTP listener binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| AppError::Invalid(format!("bad bind address: {e}")))
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session.lifetime_secs)
    }

    pub fn register_deadline(&self) -> Duration {
        Duration::from_millis(self.deadlines.register_ms)
    }

    pub fn login_deadline(&self) -> Duration {
        Duration::from_millis(self.deadlines.login_ms)
    }

    /// Reject settings the server cannot run safely with
    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(AppError::Invalid(format!(
                "log.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        if !is_cookie_name(&self.session.cookie_name) || !is_cookie_name(&self.csrf.cookie_name) {
            return Err(AppError::Invalid(
                "cookie names must be non-empty ASCII letters, digits, '-' or '_'".to_string(),
            ));
        }

        if axum::http::HeaderName::from_bytes(self.csrf.header.as_bytes()).is_err() {
            return Err(AppError::Invalid("csrf.header is not a valid header name".to_string()));
        }

        if self.session.token_bytes < 16 {
            return Err(AppError::Invalid(
                "session.token_bytes must be at least 16".to_string(),
            ));
        }

        if self.session.lifetime_secs == 0 || self.session.lifetime_secs > MAX_SESSION_LIFETIME_SECS {
            return Err(AppError::Invalid(format!(
                "session.lifetime_secs must be between 1 and {MAX_SESSION_LIFETIME_SECS}"
            )));
        }

        if self.deadlines.register_ms == 0 || self.deadlines.login_ms == 0 {
            return Err(AppError::Invalid("deadlines must be positive".to_string()));
        }

        match self.kdf.algo {
            KdfAlgo::Scrypt if !(1..=20).contains(&self.kdf.cost) => {
                return Err(AppError::Invalid(
                    "kdf.cost for scrypt must be between 1 and 20".to_string(),
                ));
            },
            KdfAlgo::Argon2 if self.kdf.cost == 0 => {
                return Err(AppError::Invalid(
                    "kdf.cost for argon2 must be positive".to_string(),
                ));
            },
            _ => {},
        }

        if self.csrf.enabled && self.csrf.key.is_empty() {
            return Err(AppError::Invalid(
                "csrf.key is required when csrf is enabled".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Load settings from defaults, an optional TOML file, then `PINBOARD_*`
/// environment variables (`__` separates sections, e.g.
/// `PINBOARD_SESSION__LIFETIME_SECS`).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, AppError> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    let settings: Settings = figment
        .merge(Env::prefixed("PINBOARD_").split("__"))
        .extract()
        .map_err(|e| AppError::Invalid(format!("configuration: {e}")))?;

    settings.validate()?;
    Ok(settings)
}
