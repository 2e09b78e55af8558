//! Input validation functions
//!
//! Shared between client and server: clients may pre-validate, the server
//! enforces.

mod info;
mod login;
mod message;
mod password;

pub use info::{InfoError, MAX_INFO_LENGTH, validate_info};
pub use login::{LoginError, MAX_LOGIN_LENGTH, validate_login};
pub use message::{MAX_MESSAGE_LENGTH, MessageError, validate_message};
pub use password::{MAX_PASSWORD_LENGTH, PasswordError, validate_password};
