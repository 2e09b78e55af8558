//! I/O helpers between protocol messages and the wire format
//!
//! Readers and writers here never interpret the conversation; they only
//! move one typed message through one frame.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::framing::{DEFAULT_FRAME_TIMEOUT, FrameError, FrameReader, FrameWriter, MessageId, RawFrame};
use crate::protocol::{ClientMessage, ServerMessage};

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(msg) => io::Error::other(msg),
            FrameError::ConnectionClosed => {
                io::Error::new(io::ErrorKind::ConnectionReset, "connection closed")
            }
            FrameError::FrameTimeout | FrameError::IdleTimeout => {
                io::Error::new(io::ErrorKind::TimedOut, err.to_string())
            }
            other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Send a `ClientMessage` with a fresh message ID, returning the ID used
pub async fn send_client_message<W>(
    writer: &mut FrameWriter<W>,
    message: &ClientMessage,
) -> io::Result<MessageId>
where
    W: AsyncWriteExt + Unpin,
{
    let message_id = MessageId::new();
    let payload =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let frame = RawFrame::new(message_id, client_message_type(message).to_string(), payload);
    writer.write_frame(&frame).await?;
    Ok(message_id)
}

/// Send a `ServerMessage` with a fresh message ID
///
/// Used for unsolicited traffic such as relayed chat messages.
pub async fn send_server_message<W>(
    writer: &mut FrameWriter<W>,
    message: &ServerMessage,
) -> io::Result<MessageId>
where
    W: AsyncWriteExt + Unpin,
{
    let message_id = MessageId::new();
    send_server_message_with_id(writer, message, message_id).await?;
    Ok(message_id)
}

/// Send a `ServerMessage` echoing the request's message ID
pub async fn send_server_message_with_id<W>(
    writer: &mut FrameWriter<W>,
    message: &ServerMessage,
    message_id: MessageId,
) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let payload =
        serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let frame = RawFrame::new(message_id, server_message_type(message).to_string(), payload);
    writer.write_frame(&frame).await.map_err(Into::into)
}

/// Received client message with its message ID
#[derive(Debug)]
pub struct ReceivedClientMessage {
    pub message_id: MessageId,
    pub message: ClientMessage,
}

/// Received server message with its message ID
#[derive(Debug)]
pub struct ReceivedServerMessage {
    pub message_id: MessageId,
    pub message: ServerMessage,
}

/// Read a `ClientMessage`, bounding how long a started frame may take
///
/// Returns `Ok(None)` if the connection was cleanly closed.
pub async fn read_client_message_with_timeout<R>(
    reader: &mut FrameReader<R>,
) -> Result<Option<ReceivedClientMessage>, FrameError>
where
    R: AsyncReadExt + Unpin,
{
    let Some(frame) = reader.read_frame_with_timeout(DEFAULT_FRAME_TIMEOUT).await? else {
        return Ok(None);
    };

    parse_client_frame(frame).map(Some)
}

/// Read a `ClientMessage`, also disconnecting connections idle for `idle_timeout`
pub async fn read_client_message_with_full_timeout<R>(
    reader: &mut FrameReader<R>,
    idle_timeout: Duration,
) -> Result<Option<ReceivedClientMessage>, FrameError>
where
    R: AsyncReadExt + Unpin,
{
    let Some(frame) = reader
        .read_frame_with_full_timeout(idle_timeout, DEFAULT_FRAME_TIMEOUT)
        .await?
    else {
        return Ok(None);
    };

    parse_client_frame(frame).map(Some)
}

/// Read a `ServerMessage` with no timeout
///
/// Returns `Ok(None)` if the connection was cleanly closed.
pub async fn read_server_message<R>(
    reader: &mut FrameReader<R>,
) -> io::Result<Option<ReceivedServerMessage>>
where
    R: AsyncReadExt + Unpin,
{
    let Some(frame) = reader.read_frame().await? else {
        return Ok(None);
    };

    parse_server_frame(frame).map(Some).map_err(Into::into)
}

fn parse_client_frame(frame: RawFrame) -> Result<ReceivedClientMessage, FrameError> {
    let message: ClientMessage = serde_json::from_slice(&frame.payload)
        .map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    // The header type must agree with the JSON tag
    let expected_type = client_message_type(&message);
    if frame.message_type != expected_type {
        return Err(FrameError::InvalidJson(format!(
            "frame type mismatch: frame says '{}' but JSON is '{}'",
            frame.message_type, expected_type
        )));
    }

    Ok(ReceivedClientMessage {
        message_id: frame.message_id,
        message,
    })
}

fn parse_server_frame(frame: RawFrame) -> Result<ReceivedServerMessage, FrameError> {
    let message: ServerMessage = serde_json::from_slice(&frame.payload)
        .map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    let expected_type = server_message_type(&message);
    if frame.message_type != expected_type {
        return Err(FrameError::InvalidJson(format!(
            "frame type mismatch: frame says '{}' but JSON is '{}'",
            frame.message_type, expected_type
        )));
    }

    Ok(ReceivedServerMessage {
        message_id: frame.message_id,
        message,
    })
}

/// Get the type name for a client message (matches enum variant name)
#[must_use]
pub fn client_message_type(message: &ClientMessage) -> &'static str {
    match message {
        ClientMessage::Hello { .. } => "Hello",
        ClientMessage::ChallengeResponse { .. } => "ChallengeResponse",
        ClientMessage::ChatSend { .. } => "ChatSend",
        ClientMessage::ContactAdd { .. } => "ContactAdd",
        ClientMessage::ContactDelete { .. } => "ContactDelete",
        ClientMessage::ContactList => "ContactList",
        ClientMessage::History { .. } => "History",
    }
}

/// Get the type name for a server message (matches enum variant name)
#[must_use]
pub fn server_message_type(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::Challenge { .. } => "Challenge",
        ServerMessage::AuthResponse { .. } => "AuthResponse",
        ServerMessage::ChatMessage { .. } => "ChatMessage",
        ServerMessage::ChatSendResponse { .. } => "ChatSendResponse",
        ServerMessage::ContactResponse { .. } => "ContactResponse",
        ServerMessage::HistoryResponse { .. } => "HistoryResponse",
        ServerMessage::Error { .. } => "Error",
    }
}
