//! Frame reader for parsing relay messages from a stream

use std::io;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use super::error::FrameError;
use super::frame::RawFrame;
use super::limits::{DEFAULT_MAX_PAYLOAD_LENGTH, is_known_message_type};
use super::message_id::MessageId;
use super::{
    DELIMITER, MAGIC, MAX_PAYLOAD_LENGTH_DIGITS, MAX_TYPE_LENGTH, MAX_TYPE_LENGTH_DIGITS,
    MSG_ID_LENGTH, TERMINATOR,
};

/// Default timeout for completing a frame once the first byte is received
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(60);

/// Reads relay frames from an async reader
pub struct FrameReader<R> {
    reader: R,
    max_payload: u64,
}

impl<R> FrameReader<R> {
    /// Create a frame reader with the default payload limit
    pub fn new(reader: R) -> Self {
        Self::with_max_payload(reader, DEFAULT_MAX_PAYLOAD_LENGTH)
    }

    /// Create a frame reader that rejects payloads larger than `max_payload` bytes
    pub fn with_max_payload(reader: R, max_payload: u64) -> Self {
        Self {
            reader,
            max_payload,
        }
    }

    pub fn max_payload(&self) -> u64 {
        self.max_payload
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncReadExt + Unpin> FrameReader<R> {
    /// Read the next frame from the stream
    ///
    /// Returns `Ok(None)` if the peer closed the connection between frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed, exceeds the payload limit,
    /// or an I/O error occurs. Waits indefinitely for data.
    pub async fn read_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        let first_byte = match self.read_byte_allow_eof().await? {
            Some(b) => b,
            None => return Ok(None),
        };

        self.read_frame_after_first_byte(first_byte).await
    }

    /// Read the next frame, bounding only the time to finish a started frame
    ///
    /// Waits indefinitely for the first byte, then requires the rest of the
    /// frame to arrive within `frame_timeout`.
    pub async fn read_frame_with_timeout(
        &mut self,
        frame_timeout: Duration,
    ) -> Result<Option<RawFrame>, FrameError> {
        let first_byte = match self.read_byte_allow_eof().await? {
            Some(b) => b,
            None => return Ok(None),
        };

        match timeout(frame_timeout, self.read_frame_after_first_byte(first_byte)).await {
            Ok(result) => result,
            Err(_) => Err(FrameError::FrameTimeout),
        }
    }

    /// Read the next frame with both an idle and a frame timeout
    ///
    /// # Arguments
    ///
    /// * `idle_timeout` - Maximum time to wait for the first byte
    /// * `frame_timeout` - Maximum time to complete the frame after the first byte
    ///
    /// # Errors
    ///
    /// Returns `FrameError::IdleTimeout` if nothing arrives within
    /// `idle_timeout`, `FrameError::FrameTimeout` if a started frame stalls.
    pub async fn read_frame_with_full_timeout(
        &mut self,
        idle_timeout: Duration,
        frame_timeout: Duration,
    ) -> Result<Option<RawFrame>, FrameError> {
        let first_byte = match timeout(idle_timeout, self.read_byte_allow_eof()).await {
            Ok(Ok(Some(b))) => b,
            Ok(Ok(None)) => return Ok(None),
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(FrameError::IdleTimeout),
        };

        match timeout(frame_timeout, self.read_frame_after_first_byte(first_byte)).await {
            Ok(result) => result,
            Err(_) => Err(FrameError::FrameTimeout),
        }
    }

    async fn read_frame_after_first_byte(
        &mut self,
        first_byte: u8,
    ) -> Result<Option<RawFrame>, FrameError> {
        if first_byte != MAGIC[0] {
            return Err(FrameError::InvalidMagic);
        }

        let mut magic_rest = [0u8; 2];
        self.reader.read_exact(&mut magic_rest).await?;
        if magic_rest != MAGIC[1..] {
            return Err(FrameError::InvalidMagic);
        }

        let type_length = self
            .read_length_field(
                MAX_TYPE_LENGTH_DIGITS,
                FrameError::InvalidTypeLength,
                FrameError::TypeLengthTooManyDigits,
            )
            .await?;
        if type_length == 0 || type_length > MAX_TYPE_LENGTH as u64 {
            return Err(FrameError::TypeLengthOutOfRange);
        }

        let mut type_bytes = vec![0u8; type_length as usize];
        self.reader.read_exact(&mut type_bytes).await?;
        let message_type = String::from_utf8(type_bytes)
            .map_err(|_| FrameError::UnknownMessageType("<invalid utf8>".to_string()))?;

        if !is_known_message_type(&message_type) {
            return Err(FrameError::UnknownMessageType(message_type));
        }

        if self.read_byte().await? != DELIMITER {
            return Err(FrameError::MissingDelimiter);
        }

        let mut msg_id_bytes = [0u8; MSG_ID_LENGTH];
        self.reader.read_exact(&mut msg_id_bytes).await?;
        let message_id = MessageId::from_bytes(&msg_id_bytes)?;

        if self.read_byte().await? != DELIMITER {
            return Err(FrameError::MissingDelimiter);
        }

        let payload_length = self
            .read_length_field(
                MAX_PAYLOAD_LENGTH_DIGITS,
                FrameError::InvalidPayloadLength,
                FrameError::PayloadLengthTooManyDigits,
            )
            .await?;
        // Checked before allocating so a hostile length costs nothing
        if payload_length > self.max_payload {
            return Err(FrameError::FrameTooLarge {
                length: payload_length,
                max: self.max_payload,
            });
        }

        let mut payload = vec![0u8; payload_length as usize];
        self.reader.read_exact(&mut payload).await?;

        if self.read_byte().await? != TERMINATOR {
            return Err(FrameError::MissingTerminator);
        }

        Ok(Some(RawFrame::new(message_id, message_type, payload)))
    }

    /// Read a single byte, returning None on clean EOF
    async fn read_byte_allow_eof(&mut self) -> Result<Option<u8>, FrameError> {
        let mut buf = [0u8; 1];
        match self.reader.read_exact(&mut buf).await {
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_byte(&mut self) -> Result<u8, FrameError> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf).await?;
        Ok(buf[0])
    }

    /// Read ASCII digits up to the next delimiter
    async fn read_length_field(
        &mut self,
        max_digits: usize,
        invalid_err: FrameError,
        too_many_err: FrameError,
    ) -> Result<u64, FrameError> {
        let mut digits = Vec::with_capacity(max_digits);

        for _ in 0..=max_digits {
            let byte = self.read_byte().await?;

            if byte == DELIMITER {
                if digits.is_empty() {
                    return Err(invalid_err);
                }
                let s = std::str::from_utf8(&digits).map_err(|_| invalid_err.clone())?;
                return s.parse().map_err(|_| invalid_err.clone());
            }

            if !byte.is_ascii_digit() {
                return Err(invalid_err);
            }

            digits.push(byte);
        }

        Err(too_many_err)
    }
}
