//! Admission and removal

use std::net::SocketAddr;

use chrono::Utc;
use relay_common::protocol::ServerMessage;
use tokio::sync::mpsc;

use super::{ConnectionRegistry, DisconnectReason, LiveConnection, RegistryEvent};

/// Result of admitting a connection
#[derive(Debug)]
pub struct Admission {
    /// Identifies this connection for `remove_connection`
    pub connection_id: u64,
    /// Id of the connection this one replaced, if any
    pub replaced: Option<u64>,
    /// Messages routed to this connection
    pub outbound: mpsc::Receiver<ServerMessage>,
}

impl ConnectionRegistry {
    /// Register the live connection for `login`
    ///
    /// Any existing connection for the same login is evicted: its queue
    /// sender is dropped, which closes that worker. The insert happens under
    /// one write lock so broadcasters never see a partial entry.
    pub async fn admit(&self, login: &str, address: SocketAddr) -> Admission {
        let (tx, outbound) = mpsc::channel(self.queue_capacity);
        let connection_id = self.next_connection_id();
        let entry = LiveConnection {
            connection_id,
            address,
            login_time: Utc::now().timestamp_millis(),
            tx,
        };

        let previous = {
            let mut connections = self.connections.write().await;
            connections.insert(login.to_string(), entry)
        };

        let replaced = previous.map(|old| {
            self.publish(RegistryEvent::Disconnected {
                login: login.to_string(),
                reason: DisconnectReason::Replaced,
            });
            old.connection_id
        });
        self.publish(RegistryEvent::Connected {
            login: login.to_string(),
            address,
        });

        Admission {
            connection_id,
            replaced,
            outbound,
        }
    }

    /// Remove whatever connection `login` has
    pub async fn remove(&self, login: &str) -> bool {
        let removed = self.connections.write().await.remove(login).is_some();
        if removed {
            self.publish(RegistryEvent::Disconnected {
                login: login.to_string(),
                reason: DisconnectReason::Removed,
            });
        }
        removed
    }

    /// Remove `login` only if its live connection is still `connection_id`
    ///
    /// Workers call this on exit so a replaced worker cannot remove the
    /// connection that superseded it.
    pub async fn remove_connection(&self, login: &str, connection_id: u64) -> bool {
        self.evict_if_current(login, connection_id, DisconnectReason::Closed)
            .await
    }

    pub(super) async fn evict_if_current(
        &self,
        login: &str,
        connection_id: u64,
        reason: DisconnectReason,
    ) -> bool {
        let removed = {
            let mut connections = self.connections.write().await;
            match connections.get(login) {
                Some(entry) if entry.connection_id == connection_id => {
                    connections.remove(login);
                    true
                }
                _ => false,
            }
        };
        if removed {
            self.publish(RegistryEvent::Disconnected {
                login: login.to_string(),
                reason,
            });
        }
        removed
    }

    /// Drop every connection's queue, closing all workers
    ///
    /// Returns how many connections were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<String> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(login, _)| login).collect()
        };
        for login in &drained {
            self.publish(RegistryEvent::Disconnected {
                login: login.clone(),
                reason: DisconnectReason::Shutdown,
            });
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_admit_and_remove() {
        let registry = ConnectionRegistry::new();

        let admission = registry.admit("alice", addr(1000)).await;
        assert!(admission.replaced.is_none());
        assert!(registry.is_connected("alice").await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove("alice").await);
        assert!(!registry.is_connected("alice").await);
        assert!(!registry.remove("alice").await);
    }

    #[tokio::test]
    async fn test_second_admit_replaces_first() {
        let registry = ConnectionRegistry::new();

        let mut first = registry.admit("alice", addr(1000)).await;
        let second = registry.admit("alice", addr(1001)).await;

        assert_eq!(second.replaced, Some(first.connection_id));
        assert_eq!(registry.len().await, 1);
        // The first connection's queue is closed
        assert!(first.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_worker_cannot_remove_replacement() {
        let registry = ConnectionRegistry::new();

        let first = registry.admit("alice", addr(1000)).await;
        let second = registry.admit("alice", addr(1001)).await;

        assert!(!registry.remove_connection("alice", first.connection_id).await);
        assert!(registry.is_connected("alice").await);

        assert!(registry.remove_connection("alice", second.connection_id).await);
        assert!(!registry.is_connected("alice").await);
    }

    #[tokio::test]
    async fn test_events() {
        let registry = ConnectionRegistry::new();
        let mut events = registry.subscribe();

        let admission = registry.admit("alice", addr(1000)).await;
        registry
            .remove_connection("alice", admission.connection_id)
            .await;

        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Connected {
                login: "alice".to_string(),
                address: addr(1000)
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Disconnected {
                login: "alice".to_string(),
                reason: DisconnectReason::Closed
            }
        );
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = ConnectionRegistry::new();
        let mut a = registry.admit("alice", addr(1000)).await;
        let mut b = registry.admit("bob", addr(1001)).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert!(a.outbound.recv().await.is_none());
        assert!(b.outbound.recv().await.is_none());
        assert_eq!(
            registry
                .send_to(
                    "alice",
                    ServerMessage::Error {
                        message: "x".to_string(),
                        command: None
                    }
                )
                .await,
            Err(RegistryError::NotConnected("alice".to_string()))
        );
    }
}
