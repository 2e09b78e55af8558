//! Chat message body validation

/// Maximum length for message bodies in characters
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Validation error for message bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    Empty,
    TooLong,
    InvalidCharacters,
}

/// Validate a chat message body
///
/// Newlines and tabs are allowed (the frame length field delimits the
/// payload); other control characters are not.
///
/// # Errors
///
/// Returns a `MessageError` variant describing the validation failure.
pub fn validate_message(body: &str) -> Result<(), MessageError> {
    if body.trim().is_empty() {
        return Err(MessageError::Empty);
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(MessageError::TooLong);
    }
    if body
        .chars()
        .any(|ch| ch.is_control() && ch != '\n' && ch != '\t' && ch != '\r')
    {
        return Err(MessageError::InvalidCharacters);
    }
    Ok(())
}
