//! Challenge-response primitives shared by client and server
//!
//! The server stores a key derived from the password and a per-client salt.
//! During the handshake it sends the salt and a random nonce; the client
//! derives the same key and answers with `hex(HMAC-SHA256(key, nonce))`.
//! The password itself never crosses the wire, but the derived key is
//! password-equivalent for anyone who can read the server's database.

use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Length of the handshake nonce in bytes
pub const NONCE_LENGTH: usize = 32;

/// Length of the derived authentication key in bytes
pub const AUTH_KEY_LENGTH: usize = 32;

/// Length of the HMAC-SHA256 digest in bytes
pub const DIGEST_LENGTH: usize = 32;

/// Random bytes in a salt (hex encoded on the wire)
pub const SALT_LENGTH: usize = 16;

/// Prefix marking a test salt that skips Argon2
pub const FAST_SALT_PREFIX: &str = "$FAST$";

/// A derived authentication key
pub type AuthKey = [u8; AUTH_KEY_LENGTH];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("salt is not valid hex")]
    InvalidSalt,
    #[error("key derivation failed: {0}")]
    Derivation(String),
    #[error("invalid MAC key length")]
    InvalidKey,
    #[error("nonce is not valid hex")]
    MalformedNonce,
    #[error("digest is not 32 bytes of hex")]
    MalformedDigest,
}

/// Generate a fresh handshake nonce
pub fn generate_nonce() -> [u8; NONCE_LENGTH] {
    rand::rng().random()
}

/// Generate a salt for key derivation
///
/// With `fast` set the salt carries [`FAST_SALT_PREFIX`] and keys derived
/// from it use a single SHA-256 instead of Argon2. Test use only.
pub fn generate_salt(fast: bool) -> String {
    let bytes: [u8; SALT_LENGTH] = rand::rng().random();
    if fast {
        format!("{}{}", FAST_SALT_PREFIX, hex::encode(bytes))
    } else {
        hex::encode(bytes)
    }
}

/// Length of the secret that keys [`decoy_salt`]
pub const DECOY_SECRET_LENGTH: usize = 32;

/// Generate a secret for [`decoy_salt`]
pub fn generate_decoy_secret() -> [u8; DECOY_SECRET_LENGTH] {
    rand::rng().random()
}

/// Salt to challenge an unregistered `login` with
///
/// Stable for a given `secret` and `login`, and shaped like a
/// [`generate_salt`] salt, so repeated challenges for an unknown login look
/// the same as those for a registered one.
pub fn decoy_salt(secret: &[u8], login: &str) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidKey)?;
    mac.update(login.as_bytes());
    let tag = mac.finalize().into_bytes();
    Ok(hex::encode(&tag[..SALT_LENGTH]))
}

/// Derive the authentication key for `password` under `salt`
///
/// # Errors
///
/// Returns `AuthError::InvalidSalt` for a non-hex Argon2 salt and
/// `AuthError::Derivation` if Argon2 rejects its inputs.
pub fn derive_auth_key(password: &str, salt: &str) -> Result<AuthKey, AuthError> {
    if let Some(fast_salt) = salt.strip_prefix(FAST_SALT_PREFIX) {
        let key = Sha256::new()
            .chain_update(fast_salt.as_bytes())
            .chain_update(password.as_bytes())
            .finalize();
        let mut out = [0u8; AUTH_KEY_LENGTH];
        out.copy_from_slice(&key);
        return Ok(out);
    }

    let salt_bytes = hex::decode(salt).map_err(|_| AuthError::InvalidSalt)?;
    let mut key = [0u8; AUTH_KEY_LENGTH];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt_bytes, &mut key)
        .map_err(|e| AuthError::Derivation(e.to_string()))?;
    Ok(key)
}

/// Compute the hex challenge digest a client sends back
pub fn compute_digest(key: &AuthKey, nonce: &[u8]) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)?;
    mac.update(nonce);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compute the digest for a hex nonce as received in a `Challenge`
pub fn respond_to_challenge(key: &AuthKey, nonce_hex: &str) -> Result<String, AuthError> {
    let nonce = hex::decode(nonce_hex).map_err(|_| AuthError::MalformedNonce)?;
    compute_digest(key, &nonce)
}

/// Check a hex digest against the expected HMAC in constant time
///
/// # Errors
///
/// Returns `AuthError::MalformedDigest` if the digest is not 32 bytes of hex.
/// A well-formed but wrong digest is `Ok(false)`.
pub fn verify_digest(key: &AuthKey, nonce: &[u8], digest_hex: &str) -> Result<bool, AuthError> {
    let digest = hex::decode(digest_hex).map_err(|_| AuthError::MalformedDigest)?;
    if digest.len() != DIGEST_LENGTH {
        return Err(AuthError::MalformedDigest);
    }
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AuthError::InvalidKey)?;
    mac.update(nonce);
    Ok(mac.verify_slice(&digest).is_ok())
}
