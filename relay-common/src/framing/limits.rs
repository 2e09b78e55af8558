//! Frame size limits and the set of accepted message types

/// Default maximum payload size (64 KiB)
pub const DEFAULT_MAX_PAYLOAD_LENGTH: u64 = 64 * 1024;

/// Every message type name that may appear in a frame header
pub const KNOWN_MESSAGE_TYPES: &[&str] = &[
    // Client to server
    "ChallengeResponse",
    "ChatSend",
    "ContactAdd",
    "ContactDelete",
    "ContactList",
    "Hello",
    "History",
    // Server to client
    "AuthResponse",
    "Challenge",
    "ChatMessage",
    "ChatSendResponse",
    "ContactResponse",
    "Error",
    "HistoryResponse",
];

/// Check whether a frame type name is part of the protocol
pub fn is_known_message_type(message_type: &str) -> bool {
    KNOWN_MESSAGE_TYPES.contains(&message_type)
}
