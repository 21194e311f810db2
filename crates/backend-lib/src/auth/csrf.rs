// ============================
// crates/backend-lib/src/auth/csrf.rs
// ============================
//! CSRF tokens.
//!
//! Once a session exists its CSRF token lives in the session entry. Before
//! that, the gate hands out an anonymous token `<nonce>.<mac>` signed with a
//! server-side key and stored in a cookie; the client echoes it back in the
//! header (double submit).
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::token_generator::generate_secure_token_with_size;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Longest CSRF token accepted from a client
pub const MAX_CSRF_TOKEN_LEN: usize = 128;

const NONCE_BYTES: usize = 24;

/// Supplies the HMAC key for anonymous CSRF tokens
pub trait CsrfKeySource: Send + Sync {
    fn csrf_key(&self) -> &[u8];
}

/// Key fixed at startup, usually from `csrf.key`
pub struct StaticCsrfKey(Vec<u8>);

impl StaticCsrfKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }
}

impl CsrfKeySource for StaticCsrfKey {
    fn csrf_key(&self) -> &[u8] {
        &self.0
    }
}

pub struct CsrfTokens {
    key: Box<dyn CsrfKeySource>,
}

impl CsrfTokens {
    pub fn new(key: Box<dyn CsrfKeySource>) -> Self {
        Self { key }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(self.key.csrf_key())
            .map_err(|e| AppError::Internal(format!("csrf key: {e}")))
    }

    /// Fresh signed token for a client without a session
    pub fn issue_anonymous(&self) -> Result<String, AppError> {
        let nonce = generate_secure_token_with_size(NONCE_BYTES)?;
        let mut mac = self.mac()?;
        mac.update(nonce.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{nonce}.{tag}"))
    }

    /// True if `token` was issued by `issue_anonymous` under the current key
    pub fn verify_anonymous(&self, token: &str) -> bool {
        if token.len() > MAX_CSRF_TOKEN_LEN {
            return false;
        }
        let Some((nonce, tag)) = token.split_once('.') else {
            return false;
        };
        let Ok(tag) = URL_SAFE_NO_PAD.decode(tag) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(nonce.as_bytes());
        mac.verify_slice(&tag).is_ok()
    }
}

/// Compare two tokens without an early exit on the first differing byte
pub fn tokens_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
