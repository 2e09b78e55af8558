//! Relay Common Library
//!
//! Wire framing, protocol messages and handshake primitives shared by the
//! relay server and its clients.

pub mod auth;
pub mod framing;
pub mod io;
pub mod protocol;
pub mod validators;

/// Default TCP port for relay connections
pub const DEFAULT_PORT: u16 = 7777;
