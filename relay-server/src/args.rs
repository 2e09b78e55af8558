//! Command-line argument parsing

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use relay_common::framing::DEFAULT_MAX_PAYLOAD_LENGTH;

use crate::config::{ConfigError, Port, ServerConfig};
use crate::constants::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE};

/// Get default database path help text for current platform
fn default_database_help() -> String {
    #[cfg(target_os = "linux")]
    return "Database file path (default: ~/.local/share/relayd/relay.db)".to_string();

    #[cfg(target_os = "macos")]
    return "Database file path (default: ~/Library/Application Support/relayd/relay.db)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "Database file path (default: %APPDATA%\\relayd\\relay.db)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Database file path (overrides platform default)".to_string();
}

/// Chat relay server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on (1-65535)
    #[arg(short, long, default_value_t = Port::default())]
    pub port: Port,

    /// Database file path (overrides platform default)
    #[arg(short, long, global = true, help = default_database_help())]
    pub database: Option<PathBuf>,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_LENGTH)]
    pub max_frame_size: u64,

    /// Seconds a client has to complete the login handshake
    #[arg(long, default_value_t = DEFAULT_HANDSHAKE_TIMEOUT.as_secs())]
    pub handshake_timeout: u64,

    /// Disconnect clients silent for this many seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    pub idle_timeout: u64,

    /// Outbound messages queued per client before it is disconnected
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Seconds connections get to close on shutdown
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    pub shutdown_grace: u64,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Administrative commands run against the database instead of serving
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the relay (the default)
    Serve,
    /// Register a new client
    Register {
        login: String,
        #[arg(long)]
        password: String,
        /// Free-form description stored with the client
        #[arg(long, default_value = "")]
        info: String,
    },
    /// Change a client's password
    Passwd {
        login: String,
        #[arg(long)]
        password: String,
    },
    /// Show a client's login history
    Logins { login: String },
    /// Show the conversation between two clients
    Transcript { a: String, b: String },
    /// Show a client's contact list
    Contacts { login: String },
}

impl TryFrom<&Args> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let config = ServerConfig {
            bind: args.bind,
            port: args.port,
            max_frame_size: args.max_frame_size,
            handshake_timeout: Duration::from_secs(args.handshake_timeout),
            idle_timeout: (args.idle_timeout > 0).then(|| Duration::from_secs(args.idle_timeout)),
            queue_capacity: args.queue_capacity,
            shutdown_grace: Duration::from_secs(args.shutdown_grace),
        };
        config.validate()?;
        Ok(config)
    }
}
