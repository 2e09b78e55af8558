//! Validated server configuration

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use relay_common::DEFAULT_PORT;
use relay_common::framing::DEFAULT_MAX_PAYLOAD_LENGTH;
use thiserror::Error;

use crate::constants::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid port '{0}': expected an integer from 1 to 65535")]
    InvalidPort(String),
    #[error("maximum frame size must be greater than zero")]
    ZeroFrameSize,
    #[error("queue capacity must be greater than zero")]
    ZeroQueueCapacity,
    #[error("handshake timeout must be greater than zero")]
    ZeroHandshakeTimeout,
}

/// A TCP port known to be in 1..=65535
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u16);

impl Port {
    /// Validate a port number
    ///
    /// # Errors
    ///
    /// Port 0 (ask the OS for any port) is rejected; the relay must listen on
    /// a known port.
    pub fn new(port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port.to_string()));
        }
        Ok(Self(port))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Self(DEFAULT_PORT)
    }
}

impl FromStr for Port {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPort(s.to_string()))?;
        Port::new(value)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime settings for the relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: Port,
    /// Largest accepted frame payload in bytes
    pub max_frame_size: u64,
    pub handshake_timeout: Duration,
    /// Close authenticated connections silent for this long; `None` disables
    pub idle_timeout: Option<Duration>,
    /// Outbound messages queued per connection before it is evicted
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: Port::default(),
            max_frame_size: DEFAULT_MAX_PAYLOAD_LENGTH,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port.get())
    }

    /// Reject settings that would make the server unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::ZeroHandshakeTimeout);
        }
        Ok(())
    }
}
