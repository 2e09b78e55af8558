//! Free-form client info validation

/// Maximum length for the optional client info text in characters
pub const MAX_INFO_LENGTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoError {
    TooLong,
    InvalidCharacters,
}

/// Validate the optional description stored with a client record
///
/// Empty is allowed.
pub fn validate_info(info: &str) -> Result<(), InfoError> {
    if info.chars().count() > MAX_INFO_LENGTH {
        return Err(InfoError::TooLong);
    }
    if info.chars().any(char::is_control) {
        return Err(InfoError::InvalidCharacters);
    }
    Ok(())
}
