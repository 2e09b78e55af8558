//! Chat relay server library
//!
//! This library exposes the server's internal modules for the `relayd`
//! binary and for integration testing.

pub mod args;
pub mod auth;
pub mod config;
pub mod connection;
pub mod constants;
pub mod db;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod server;

pub use config::{Port, ServerConfig};
pub use error::RelayError;
pub use server::Server;
