//! Connection registry: the live connection for each authenticated login
//!
//! The registry owns every connection's outbound queue sender. Dropping a
//! sender (eviction, replacement, shutdown) ends that connection's worker,
//! which is the only way one connection closes another.

mod broadcasts;
mod mutations;
mod queries;

pub use mutations::Admission;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use relay_common::protocol::ServerMessage;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::constants::{DEFAULT_QUEUE_CAPACITY, REGISTRY_EVENT_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{0}' is not connected")]
    NotConnected(String),
    #[error("outbound queue for '{0}' is full")]
    QueueFull(String),
}

/// Why a connection left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The worker ended (EOF, error, idle timeout)
    Closed,
    /// A newer connection for the same login was admitted
    Replaced,
    /// Its outbound queue overflowed
    SlowConsumer,
    /// Removed by an explicit `remove`
    Removed,
    /// Server shutdown
    Shutdown,
}

/// Membership changes published to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Connected {
        login: String,
        address: SocketAddr,
    },
    Disconnected {
        login: String,
        reason: DisconnectReason,
    },
}

/// A live connection as held by the registry
#[derive(Debug)]
struct LiveConnection {
    connection_id: u64,
    address: SocketAddr,
    login_time: i64,
    tx: mpsc::Sender<ServerMessage>,
}

/// Snapshot of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: u64,
    pub address: SocketAddr,
    /// Unix milliseconds
    pub login_time: i64,
}

/// Tracks at most one live connection per login
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<String, LiveConnection>>>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
    events: broadcast::Sender<RegistryEvent>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Registry whose per-connection queues hold `queue_capacity` messages
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(REGISTRY_EVENT_CAPACITY);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
            events,
        }
    }

    /// Observe connects and disconnects
    ///
    /// Slow subscribers miss events (`RecvError::Lagged`) rather than
    /// stalling the registry.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn next_connection_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, event: RegistryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
