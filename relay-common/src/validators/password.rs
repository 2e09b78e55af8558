//! Password validation

/// Maximum length for passwords in bytes
///
/// Bounds the cost of Argon2 over attacker-chosen input.
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Validation error for passwords
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    Empty,
    TooLong,
}

/// Validate a password being set or rotated
///
/// Control characters are accepted since they may be part of a generated
/// passphrase.
///
/// # Errors
///
/// Returns a `PasswordError` variant describing the validation failure.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}
