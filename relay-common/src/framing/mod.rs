//! Wire framing for relay messages
//!
//! Every message travels as one self-delimited frame:
//!
//! ```text
//! RL|<type_len>|<type>|<msg_id>|<payload_len>|<payload>\n
//! ```
//!
//! - `RL` is the magic prefix
//! - `type_len` / `payload_len` are ASCII decimal lengths
//! - `msg_id` is 12 lowercase hex characters used to correlate responses
//! - `payload` is UTF-8 JSON, bounded by the reader's configured maximum
//!
//! The payload length is checked against the maximum before any payload
//! bytes are buffered, so an oversized frame never allocates.

mod error;
mod frame;
mod limits;
mod message_id;
mod reader;
mod writer;

pub use error::FrameError;
pub use frame::RawFrame;
pub use limits::{DEFAULT_MAX_PAYLOAD_LENGTH, KNOWN_MESSAGE_TYPES, is_known_message_type};
pub use message_id::MessageId;
pub use reader::{DEFAULT_FRAME_TIMEOUT, FrameReader};
pub use writer::FrameWriter;

/// Magic bytes at the start of every frame, including the first delimiter
pub const MAGIC: &[u8; 3] = b"RL|";

/// Field delimiter
pub const DELIMITER: u8 = b'|';

/// Frame terminator
pub const TERMINATOR: u8 = b'\n';

/// Length of a message ID in bytes (hex characters)
pub const MSG_ID_LENGTH: usize = 12;

/// Maximum length of a message type name
pub const MAX_TYPE_LENGTH: usize = 32;

/// Maximum digits in the type length field
pub const MAX_TYPE_LENGTH_DIGITS: usize = 2;

/// Maximum digits in the payload length field (u64 fits in 20)
pub const MAX_PAYLOAD_LENGTH_DIGITS: usize = 20;
