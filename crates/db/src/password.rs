//! Argon2id hashing for stored credentials.
//!
//! Hashes are PHC strings, so the algorithm parameters and salt travel with
//! the stored value.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

pub use argon2::password_hash::Error as PasswordError;

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only for a malformed stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordError::Password) => Ok(false),
        Err(error) => Err(error),
    }
}

/// Runs a full verification against a throwaway hash so that a login for an
/// unknown account costs the same as one with a wrong password. Always false.
pub fn verify_decoy(password: &str) -> bool {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    let decoy = DECOY.get_or_init(|| hash_password("reqflow-decoy-credential").ok());
    if let Some(hash) = decoy {
        let _ = verify_password(password, hash);
    }
    false
}
