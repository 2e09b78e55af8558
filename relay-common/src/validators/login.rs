//! Login name validation

/// Maximum length for logins in characters
pub const MAX_LOGIN_LENGTH: usize = 32;

/// Characters that are not allowed in logins
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '<', '>', '"', '|', '?', '*'];

/// Validation error for logins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    Empty,
    TooLong,
    InvalidCharacters,
}

/// Validate a login name
///
/// Logins are compared exactly (case-sensitive), so validation only rejects
/// names that cannot be displayed or addressed:
/// - empty, or longer than 32 characters
/// - whitespace or control characters
/// - any of `/ \ : < > " | ? *`
///
/// # Errors
///
/// Returns a `LoginError` variant describing the validation failure.
pub fn validate_login(login: &str) -> Result<(), LoginError> {
    if login.is_empty() {
        return Err(LoginError::Empty);
    }
    if login.chars().count() > MAX_LOGIN_LENGTH {
        return Err(LoginError::TooLong);
    }
    for ch in login.chars() {
        if FORBIDDEN_CHARS.contains(&ch) {
            return Err(LoginError::InvalidCharacters);
        }
        if !ch.is_alphabetic() && !ch.is_ascii_graphic() {
            return Err(LoginError::InvalidCharacters);
        }
    }
    Ok(())
}
