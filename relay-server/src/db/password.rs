//! Password hashing using Argon2id
//!
//! # Fast Mode
//!
//! `hash_password(password, true)` produces `$FAST$<sha256 hex>` instead of
//! an Argon2 PHC string. `verify_password` detects the prefix. Fast hashes
//! exist so test suites avoid Argon2's cost; never enable them in a server.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use relay_common::validators;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix for fast (test-only) password hashes
const FAST_HASH_PREFIX: &str = "$FAST$";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid password: {0:?}")]
    Validation(validators::PasswordError),
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PasswordError::Hash(err)
    }
}

/// Hash a password for storage
///
/// # Errors
///
/// Fails if the password does not validate or Argon2 rejects it.
pub fn hash_password(password: &str, fast: bool) -> Result<String, PasswordError> {
    validators::validate_password(password).map_err(PasswordError::Validation)?;

    if fast {
        return Ok(format!("{}{}", FAST_HASH_PREFIX, fast_digest(password)));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash
///
/// Argon2 verification is constant-time. Returns `Ok(false)` on mismatch and
/// `Err` only when the stored hash cannot be parsed.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, PasswordError> {
    if password.len() > validators::MAX_PASSWORD_LENGTH {
        return Ok(false);
    }

    if let Some(stored) = password_hash.strip_prefix(FAST_HASH_PREFIX) {
        return Ok(stored == fast_digest(password));
    }

    let parsed_hash = PasswordHash::new(password_hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hash(e)),
    }
}

fn fast_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argon2_hash_and_verify() {
        let hash = hash_password("correct horse", false).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("correct horse"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_argon2_salts_differ() {
        let hash1 = hash_password("same", false).unwrap();
        let hash2 = hash_password("same", false).unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_fast_hash_and_verify() {
        let hash = hash_password("test_password", true).unwrap();

        assert!(hash.starts_with(FAST_HASH_PREFIX));
        assert!(!hash.contains("test_password"));
        assert!(verify_password("test_password", &hash).unwrap());
        assert!(!verify_password("other", &hash).unwrap());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            hash_password("", true),
            Err(PasswordError::Validation(validators::PasswordError::Empty))
        ));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
