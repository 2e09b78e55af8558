//! Frame writer for sending relay messages to a stream

use tokio::io::AsyncWriteExt;

use super::error::FrameError;
use super::frame::RawFrame;
use super::message_id::MessageId;

/// Writes relay frames to an async writer
pub struct FrameWriter<W> {
    writer: W,
}

impl<W> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWriteExt + Unpin> FrameWriter<W> {
    /// Write a frame and flush it
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub async fn write_frame(&mut self, frame: &RawFrame) -> Result<(), FrameError> {
        let bytes = frame.to_bytes();
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Build a frame from its parts and write it
    pub async fn write(
        &mut self,
        message_id: MessageId,
        message_type: &str,
        payload: &[u8],
    ) -> Result<(), FrameError> {
        let frame = RawFrame::new(message_id, message_type.to_string(), payload.to_vec());
        self.write_frame(&frame).await
    }

    /// Flush and shut down the write side of the stream
    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::FrameReader;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_frame() {
        let mut buffer = Vec::new();
        let id = MessageId::new();

        {
            let mut writer = FrameWriter::new(Cursor::new(&mut buffer));
            writer
                .write(id, "ChatSend", b"{\"body\":\"Hi\"}")
                .await
                .unwrap();
        }

        let expected = format!("RL|8|ChatSend|{}|13|{{\"body\":\"Hi\"}}\n", id);
        assert_eq!(buffer, expected.as_bytes());
    }

    #[tokio::test]
    async fn test_written_frame_is_readable() {
        let mut buffer = Vec::new();
        let id = MessageId::new();
        let payload = "{\"body\":\"line one\\nline two | with pipe\"}";

        {
            let mut writer = FrameWriter::new(Cursor::new(&mut buffer));
            writer.write(id, "ChatSend", payload.as_bytes()).await.unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.message_id, id);
        assert_eq!(frame.payload, payload.as_bytes());
    }
}
