//! Message handlers for authenticated client commands

mod chat_send;
mod contact_add;
mod contact_delete;
mod contact_list;
pub mod errors;
mod history;

#[cfg(test)]
pub mod testing;

pub use chat_send::handle_chat_send;
pub use contact_add::handle_contact_add;
pub use contact_delete::handle_contact_delete;
pub use contact_list::handle_contact_list;
pub use errors::*;
pub use history::handle_history;

use std::io;
use std::net::SocketAddr;

use chrono::Utc;
use tokio::io::AsyncWrite;

use relay_common::framing::{FrameWriter, MessageId};
use relay_common::io::send_server_message_with_id;
use relay_common::protocol::ServerMessage;

use crate::auth::Identity;
use crate::db::Database;
use crate::error::RelayError;
use crate::registry::ConnectionRegistry;

/// Context passed to all handlers with shared resources
pub struct HandlerContext<'a, W> {
    pub writer: &'a mut FrameWriter<W>,
    pub peer_addr: SocketAddr,
    pub registry: &'a ConnectionRegistry,
    pub db: &'a Database,
    /// Message ID from the incoming request (for response correlation)
    pub message_id: MessageId,
}

impl<'a, W: AsyncWrite + Unpin> HandlerContext<'a, W> {
    /// Send a message to the client, echoing the request's message ID
    pub async fn send_message(&mut self, message: &ServerMessage) -> io::Result<()> {
        send_server_message_with_id(self.writer, message, self.message_id).await
    }

    /// Send an error message without disconnecting
    pub async fn send_error(&mut self, message: &str, command: Option<&str>) -> io::Result<()> {
        let error_msg = ServerMessage::Error {
            message: message.to_string(),
            command: command.map(|s| s.to_string()),
        };
        self.send_message(&error_msg).await
    }

    /// Send an error message and disconnect
    pub async fn send_error_and_disconnect(
        &mut self,
        message: &str,
        command: Option<&str>,
    ) -> Result<(), RelayError> {
        self.send_error(message, command).await?;
        Err(RelayError::Protocol(message.to_string()))
    }

    /// Tell an unauthenticated client it must log in, then disconnect
    pub async fn reject_unauthorized(&mut self, command: &str) -> Result<(), RelayError> {
        tracing::warn!(peer = %self.peer_addr, command, "request without login");
        self.send_error(&err_not_logged_in(), Some(command)).await?;
        Err(RelayError::Unauthorized)
    }
}

/// Guard for commands that require a logged-in client
pub fn authorize(identity: Option<&Identity>) -> Result<&Identity, RelayError> {
    identity.ok_or(RelayError::Unauthorized)
}

/// Current Unix timestamp in milliseconds
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}
