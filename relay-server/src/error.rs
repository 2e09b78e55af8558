//! Error type for relay operations

use std::io;

use relay_common::framing::FrameError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::db::CredentialError;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("login '{0}' is already registered")]
    DuplicateLogin(String),
    #[error("'{0}' is not connected")]
    NotConnected(String),
    #[error("frame of {length} bytes exceeds maximum of {max}")]
    FrameTooLarge { length: u64, max: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("not authenticated")]
    Unauthorized,
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<io::Error> for RelayError {
    fn from(err: io::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

impl From<FrameError> for RelayError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::FrameTooLarge { length, max } => RelayError::FrameTooLarge { length, max },
            FrameError::Io(msg) => RelayError::Transport(msg),
            FrameError::ConnectionClosed => RelayError::Transport(err.to_string()),
            other => RelayError::Protocol(other.to_string()),
        }
    }
}

impl From<RegistryError> for RelayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotConnected(login) | RegistryError::QueueFull(login) => {
                RelayError::NotConnected(login)
            }
        }
    }
}

impl From<CredentialError> for RelayError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::DuplicateLogin(login) => RelayError::DuplicateLogin(login),
            CredentialError::Database(e) => RelayError::Persistence(e),
            other => RelayError::Credential(other.to_string()),
        }
    }
}
