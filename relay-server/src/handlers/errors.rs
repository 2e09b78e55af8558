//! Error message functions for handlers
//!
//! Functions are organized alphabetically for easy lookup.

use relay_common::validators::{LoginError, MAX_LOGIN_LENGTH, MAX_MESSAGE_LENGTH, MessageError};

/// "already logged in" error for handshake messages after login
pub fn err_already_logged_in() -> String {
    "Already logged in".to_string()
}

/// "contact already present" error
pub fn err_contact_exists(login: &str) -> String {
    format!("'{}' is already in your contacts", login)
}

/// "contact not present" error
pub fn err_contact_not_found(login: &str) -> String {
    format!("'{}' is not in your contacts", login)
}

/// Generic database failure, without internals
pub fn err_database() -> String {
    "Database error".to_string()
}

/// "frame too large" error
pub fn err_frame_too_large(max: u64) -> String {
    format!("Frame exceeds maximum size of {} bytes", max)
}

/// Error for a login that failed validation
pub fn err_login_invalid(error: LoginError) -> String {
    match error {
        LoginError::Empty => "Login is empty".to_string(),
        LoginError::TooLong => format!("Login is longer than {} characters", MAX_LOGIN_LENGTH),
        LoginError::InvalidCharacters => "Login contains invalid characters".to_string(),
    }
}

/// Error for a message body that failed validation
pub fn err_message_invalid(error: MessageError) -> String {
    match error {
        MessageError::Empty => "Message is empty".to_string(),
        MessageError::TooLong => {
            format!("Message is longer than {} characters", MAX_MESSAGE_LENGTH)
        }
        MessageError::InvalidCharacters => "Message contains invalid characters".to_string(),
    }
}

/// "malformed frame" error
pub fn err_malformed_frame(detail: &str) -> String {
    format!("Malformed frame: {}", detail)
}

/// "not logged in" error
pub fn err_not_logged_in() -> String {
    "Not logged in".to_string()
}

/// "login could not be recorded" error during connection setup
pub fn err_session_setup() -> String {
    "Could not start session".to_string()
}

/// "unknown login" error for routing and lookups
pub fn err_unknown_login(login: &str) -> String {
    format!("Unknown login '{}'", login)
}
