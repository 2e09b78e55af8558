//! Protocol definitions for the chat relay
//!
//! Messages are JSON objects tagged by `type` and carried inside frames
//! (see [`crate::framing`]). Nothing here is encrypted: only the handshake
//! keeps the password off the wire, as an HMAC over a server nonce.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric outcome codes carried in responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum ResponseCode {
    /// Request completed (delivered, added, removed)
    Ok,
    /// Request accepted but not (yet) delivered, or a listing
    Accepted,
    /// Request was malformed or failed validation
    BadRequest,
    /// Referenced login or entry does not exist
    NotFound,
    /// Entry already exists
    Conflict,
    /// Server failed to complete the request
    InternalError,
}

impl ResponseCode {
    pub const fn as_u16(self) -> u16 {
        match self {
            ResponseCode::Ok => 200,
            ResponseCode::Accepted => 202,
            ResponseCode::BadRequest => 400,
            ResponseCode::NotFound => 404,
            ResponseCode::Conflict => 409,
            ResponseCode::InternalError => 500,
        }
    }

    /// True for 2xx codes
    pub const fn is_success(self) -> bool {
        matches!(self, ResponseCode::Ok | ResponseCode::Accepted)
    }
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for ResponseCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(ResponseCode::Ok),
            202 => Ok(ResponseCode::Accepted),
            400 => Ok(ResponseCode::BadRequest),
            404 => Ok(ResponseCode::NotFound),
            409 => Ok(ResponseCode::Conflict),
            500 => Ok(ResponseCode::InternalError),
            other => Err(format!("unknown response code {other}")),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Client request messages
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Opens the handshake for `login`
    Hello { login: String },
    /// Hex HMAC-SHA256 of the challenge nonce
    ChallengeResponse { digest: String },
    /// Send a message; an empty receiver broadcasts to everyone else
    ChatSend {
        #[serde(default)]
        receiver: String,
        body: String,
    },
    ContactAdd { login: String },
    ContactDelete { login: String },
    ContactList,
    /// Conversation with one peer, oldest first
    History { with: String },
}

/// Server response and event messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Handshake challenge: hex nonce and the salt for key derivation
    Challenge { nonce: String, salt: String },
    AuthResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A relayed message; `receiver` is empty for broadcasts
    ChatMessage {
        sender: String,
        receiver: String,
        body: String,
        timestamp: i64,
    },
    ChatSendResponse {
        code: ResponseCode,
        /// Number of live connections the message was queued to
        delivered: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ContactResponse {
        code: ResponseCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contacts: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    HistoryResponse {
        code: ResponseCode,
        #[serde(default)]
        messages: Vec<HistoryEntry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
}

/// One persisted message as returned by `History`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: i64,
}

impl fmt::Debug for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Hello { login } => f.debug_struct("Hello").field("login", login).finish(),
            // The digest is password-equivalent for this nonce
            ClientMessage::ChallengeResponse { .. } => f
                .debug_struct("ChallengeResponse")
                .field("digest", &"<REDACTED>")
                .finish(),
            ClientMessage::ChatSend { receiver, body } => f
                .debug_struct("ChatSend")
                .field("receiver", receiver)
                .field("body_len", &body.len())
                .finish(),
            ClientMessage::ContactAdd { login } => {
                f.debug_struct("ContactAdd").field("login", login).finish()
            }
            ClientMessage::ContactDelete { login } => {
                f.debug_struct("ContactDelete").field("login", login).finish()
            }
            ClientMessage::ContactList => f.write_str("ContactList"),
            ClientMessage::History { with } => {
                f.debug_struct("History").field("with", with).finish()
            }
        }
    }
}
