// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod cookie;
pub mod csrf;
pub mod password;
pub mod session;
pub mod token_generator;
mod service;
mod service_impl;

pub use cookie::{read_cookie, CookieMinter, SameSite, SessionCookie};
pub use csrf::{tokens_match, CsrfKeySource, CsrfTokens, StaticCsrfKey};
pub use password::{verify_password, Kdf};
pub use service::{AuthOutcome, AuthService};
pub use service_impl::DefaultAuth;
pub use session::{Session, SessionError, SessionManager};
