// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Hashes are stored as PHC strings, which carry the algorithm, its cost
//! parameters and the per-record salt. Verification reads all three from the
//! stored string, so changing the configured algorithm or cost never locks
//! out existing users.
use argon2::{Algorithm, Argon2, Params as Argon2Params, Version};
use scrypt::{
    password_hash::{
        rand_core::OsRng, Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Params as ScryptParams, Scrypt,
};
use zeroize::Zeroizing;

use crate::config::{KdfAlgo, KdfSettings};
use crate::error::AppError;

/// Argon2 memory cost in KiB (19 MiB)
const ARGON2_M_COST: u32 = 19 * 1024;
/// scrypt block size and parallelism
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_LEN: usize = 32;

/// Configured password KDF
#[derive(Debug, Clone)]
pub struct Kdf {
    algo: KdfAlgo,
    cost: u32,
}

impl Kdf {
    pub fn new(settings: &KdfSettings) -> Self {
        Self {
            algo: settings.algo,
            cost: settings.cost,
        }
    }

    /// Hash a password with a fresh 16-byte salt from the OS CSPRNG
    pub fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        match self.algo {
            KdfAlgo::Scrypt => {
                let log_n = u8::try_from(self.cost)
                    .map_err(|_| AppError::Internal("scrypt cost out of range".to_string()))?;
                let params = ScryptParams::new(log_n, SCRYPT_R, SCRYPT_P, SCRYPT_LEN)
                    .map_err(|e| AppError::Internal(format!("scrypt params: {e}")))?;
                let hash = Scrypt
                    .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
                    .map_err(|e| AppError::Internal(format!("scrypt: {e}")))?;
                Ok(hash.to_string())
            },
            KdfAlgo::Argon2 => {
                let params = Argon2Params::new(ARGON2_M_COST, self.cost, 1, None)
                    .map_err(|e| AppError::Internal(format!("argon2 params: {e}")))?;
                let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password(plain.as_bytes(), &salt)
                    .map_err(|e| AppError::Internal(format!("argon2: {e}")))?;
                Ok(hash.to_string())
            },
        }
    }

    /// Hash on the blocking pool
    pub async fn hash_password_blocking(&self, plain: &str) -> Result<String, AppError> {
        let kdf = self.clone();
        let plain = Zeroizing::new(plain.to_string());
        tokio::task::spawn_blocking(move || kdf.hash_password(&plain)).await?
    }
}

/// Verify a password against a stored PHC hash.
///
/// Returns `Ok(false)` on a mismatch. The digest comparison inside
/// `password-hash` is constant time. Unparseable hashes are internal errors,
/// not wrong passwords.
pub fn verify_password(hash: &str, plain: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("stored password hash unreadable: {e}")))?;
    let verifiers: [&dyn PasswordVerifier; 2] = [&Scrypt, &Argon2::default()];
    match parsed_hash.verify_password(&verifiers, plain) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("password verification: {e}"))),
    }
}

/// `verify_password` on the blocking pool
pub async fn verify_password_blocking(hash: String, plain: &str) -> Result<bool, AppError> {
    let plain = Zeroizing::new(plain.to_string());
    tokio::task::spawn_blocking(move || verify_password(&hash, &plain)).await?
}

/// Extract the salt from a PHC hash string
pub fn salt_of(hash: &str) -> Option<String> {
    PasswordHash::new(hash)
        .ok()
        .and_then(|h| h.salt.map(|s| s.as_str().to_string()))
}
