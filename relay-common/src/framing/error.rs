//! Frame parsing errors

use std::io;

use thiserror::Error;

/// Errors produced while reading or writing frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed mid-frame")]
    ConnectionClosed,
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("invalid type length field")]
    InvalidTypeLength,
    #[error("type length field has too many digits")]
    TypeLengthTooManyDigits,
    #[error("type length out of range")]
    TypeLengthOutOfRange,
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("missing delimiter")]
    MissingDelimiter,
    #[error("invalid message id")]
    InvalidMessageId,
    #[error("invalid payload length field")]
    InvalidPayloadLength,
    #[error("payload length field has too many digits")]
    PayloadLengthTooManyDigits,
    #[error("frame payload of {length} bytes exceeds maximum of {max}")]
    FrameTooLarge { length: u64, max: u64 },
    #[error("missing frame terminator")]
    MissingTerminator,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    #[error("frame did not complete in time")]
    FrameTimeout,
    #[error("no data received before idle timeout")]
    IdleTimeout,
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::ConnectionClosed
        } else {
            FrameError::Io(err.to_string())
        }
    }
}
