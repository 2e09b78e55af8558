//! Message IDs for request/response correlation

use std::fmt;

use rand::RngExt;

use super::MSG_ID_LENGTH;
use super::error::FrameError;

/// A 12-character lowercase hex identifier carried in every frame
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; MSG_ID_LENGTH]);

impl MessageId {
    /// Generate a random message ID
    pub fn new() -> Self {
        let raw: [u8; MSG_ID_LENGTH / 2] = rand::rng().random();
        let mut bytes = [0u8; MSG_ID_LENGTH];
        bytes.copy_from_slice(hex::encode(raw).as_bytes());
        Self(bytes)
    }

    /// Parse a message ID from its wire bytes
    ///
    /// # Errors
    ///
    /// Returns `FrameError::InvalidMessageId` unless the input is exactly
    /// 12 lowercase hex characters.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != MSG_ID_LENGTH {
            return Err(FrameError::InvalidMessageId);
        }
        if !bytes
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
        {
            return Err(FrameError::InvalidMessageId);
        }
        let mut id = [0u8; MSG_ID_LENGTH];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    pub fn as_bytes(&self) -> &[u8; MSG_ID_LENGTH] {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Constructors only admit ASCII hex
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("????????????"))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self)
    }
}
