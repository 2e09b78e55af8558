//! Server-wide constants and defaults

use std::time::Duration;

/// Directory under the platform data dir holding server state
pub const DATA_DIR_NAME: &str = "relayd";

/// Database file name inside [`DATA_DIR_NAME`]
pub const DATABASE_FILENAME: &str = "relay.db";

/// Connections kept in the SQLite pool
pub const MAX_DB_CONNECTIONS: u32 = 5;

/// Time a client has to finish the challenge-response handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages queued per connection before it is treated as a slow peer
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Time connections get to close after shutdown before they are aborted
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Capacity of the registry event channel
pub const REGISTRY_EVENT_CAPACITY: usize = 64;

/// Incoming frames buffered between a connection's reader and its worker
pub const INBOUND_QUEUE_CAPACITY: usize = 4;

/// Pause after a failed accept, e.g. when out of file descriptors
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);
