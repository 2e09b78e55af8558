//! Routing messages to live connections
//!
//! Delivery never waits: each message is `try_send`-ed to the target's
//! bounded queue. A full queue means the peer is not keeping up, and it is
//! evicted rather than allowed to stall the sender.

use relay_common::protocol::ServerMessage;
use tokio::sync::mpsc::error::TrySendError;

use super::{ConnectionRegistry, DisconnectReason, RegistryError};

impl ConnectionRegistry {
    /// Queue `message` for every live connection except `sender`
    ///
    /// Returns the number of connections it was queued to. Connections whose
    /// queue is full are evicted and not counted.
    pub async fn broadcast(&self, sender: &str, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        let mut overflowed = Vec::new();

        {
            let connections = self.connections.read().await;
            for (login, entry) in connections.iter() {
                if login == sender {
                    continue;
                }
                match entry.tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        overflowed.push((login.clone(), entry.connection_id, true));
                    }
                    Err(TrySendError::Closed(_)) => {
                        overflowed.push((login.clone(), entry.connection_id, false));
                    }
                }
            }
        }

        for (login, connection_id, full) in overflowed {
            let reason = if full {
                tracing::warn!(login = %login, "outbound queue full, disconnecting slow peer");
                DisconnectReason::SlowConsumer
            } else {
                DisconnectReason::Closed
            };
            self.evict_if_current(&login, connection_id, reason).await;
        }

        delivered
    }

    /// Queue `message` for `receiver`
    ///
    /// # Errors
    ///
    /// `RegistryError::NotConnected` if the receiver has no live connection,
    /// `RegistryError::QueueFull` if its queue overflowed (it is evicted).
    pub async fn send_to(&self, receiver: &str, message: ServerMessage) -> Result<(), RegistryError> {
        let outcome = {
            let connections = self.connections.read().await;
            let Some(entry) = connections.get(receiver) else {
                return Err(RegistryError::NotConnected(receiver.to_string()));
            };
            entry
                .tx
                .try_send(message)
                .map_err(|e| (entry.connection_id, matches!(e, TrySendError::Full(_))))
        };

        match outcome {
            Ok(()) => Ok(()),
            Err((connection_id, true)) => {
                tracing::warn!(login = %receiver, "outbound queue full, disconnecting slow peer");
                self.evict_if_current(receiver, connection_id, DisconnectReason::SlowConsumer)
                    .await;
                Err(RegistryError::QueueFull(receiver.to_string()))
            }
            Err((connection_id, false)) => {
                self.evict_if_current(receiver, connection_id, DisconnectReason::Closed)
                    .await;
                Err(RegistryError::NotConnected(receiver.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryEvent;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4000))
    }

    fn chat(body: &str) -> ServerMessage {
        ServerMessage::ChatMessage {
            sender: "alice".to_string(),
            receiver: String::new(),
            body: body.to_string(),
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let registry = ConnectionRegistry::new();
        let mut alice = registry.admit("alice", addr()).await;
        let mut bob = registry.admit("bob", addr()).await;
        let mut carol = registry.admit("carol", addr()).await;

        let delivered = registry.broadcast("alice", &chat("hi")).await;

        assert_eq!(delivered, 2);
        assert_eq!(bob.outbound.try_recv().unwrap(), chat("hi"));
        assert_eq!(carol.outbound.try_recv().unwrap(), chat("hi"));
        assert!(alice.outbound.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_broadcast_during_admit_and_remove() {
        const ROUNDS: usize = 200;
        let registry = ConnectionRegistry::with_queue_capacity(ROUNDS * 2);
        let mut alice = registry.admit("alice", addr()).await;
        let mut carol = registry.admit("carol", addr()).await;

        let churn = |registry: ConnectionRegistry| async move {
            for _ in 0..ROUNDS {
                let bob = registry.admit("bob", addr()).await;
                tokio::task::yield_now().await;
                registry.remove_connection("bob", bob.connection_id).await;
            }
        };

        let broadcaster = {
            let registry = registry.clone();
            async move {
                for i in 0..ROUNDS {
                    let delivered = registry.broadcast("alice", &chat(&i.to_string())).await;
                    assert!((1..=2).contains(&delivered), "delivered to {}", delivered);
                    assert!(registry.len().await <= 3);
                    tokio::task::yield_now().await;
                }
            }
        };

        let first = tokio::spawn(churn(registry.clone()));
        let second = tokio::spawn(churn(registry.clone()));
        let broadcasting = tokio::spawn(broadcaster);
        let (first, second, broadcasting) = tokio::join!(first, second, broadcasting);
        first.unwrap();
        second.unwrap();
        broadcasting.unwrap();

        assert!(alice.outbound.try_recv().is_err());
        for i in 0..ROUNDS {
            assert_eq!(carol.outbound.try_recv().unwrap(), chat(&i.to_string()));
        }
        assert!(registry.len().await <= 3);
        assert_eq!(
            registry.connected_logins().await,
            vec!["alice".to_string(), "carol".to_string()]
        );
    }

    #[tokio::test]
    async fn test_broadcast_with_no_peers() {
        let registry = ConnectionRegistry::new();
        let _alice = registry.admit("alice", addr()).await;
        assert_eq!(registry.broadcast("alice", &chat("anyone?")).await, 0);
    }

    #[tokio::test]
    async fn test_send_to() {
        let registry = ConnectionRegistry::new();
        let mut bob = registry.admit("bob", addr()).await;

        registry.send_to("bob", chat("direct")).await.unwrap();
        assert_eq!(bob.outbound.try_recv().unwrap(), chat("direct"));

        assert_eq!(
            registry.send_to("dave", chat("nobody")).await,
            Err(RegistryError::NotConnected("dave".to_string()))
        );
    }

    #[tokio::test]
    async fn test_full_queue_evicts_slow_peer() {
        let registry = ConnectionRegistry::with_queue_capacity(2);
        let mut events = registry.subscribe();
        let mut slow = registry.admit("slow", addr()).await;
        let _fast = registry.admit("fast", addr()).await;

        registry.send_to("slow", chat("1")).await.unwrap();
        registry.send_to("slow", chat("2")).await.unwrap();
        assert_eq!(
            registry.send_to("slow", chat("3")).await,
            Err(RegistryError::QueueFull("slow".to_string()))
        );
        assert!(!registry.is_connected("slow").await);
        assert!(registry.is_connected("fast").await);

        // Already queued messages still drain, then the queue reports closed
        assert_eq!(slow.outbound.recv().await, Some(chat("1")));
        assert_eq!(slow.outbound.recv().await, Some(chat("2")));
        assert_eq!(slow.outbound.recv().await, None);

        let mut saw_slow_consumer = false;
        while let Ok(event) = events.try_recv() {
            if event
                == (RegistryEvent::Disconnected {
                    login: "slow".to_string(),
                    reason: DisconnectReason::SlowConsumer,
                })
            {
                saw_slow_consumer = true;
            }
        }
        assert!(saw_slow_consumer);
    }

    #[tokio::test]
    async fn test_broadcast_evicts_full_queue() {
        let registry = ConnectionRegistry::with_queue_capacity(1);
        let _alice = registry.admit("alice", addr()).await;
        let _bob = registry.admit("bob", addr()).await;

        assert_eq!(registry.broadcast("alice", &chat("1")).await, 1);
        assert_eq!(registry.broadcast("alice", &chat("2")).await, 0);
        assert!(!registry.is_connected("bob").await);
        assert!(registry.is_connected("alice").await);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_cleaned_up() {
        let registry = ConnectionRegistry::new();
        let bob = registry.admit("bob", addr()).await;
        drop(bob.outbound);

        assert_eq!(
            registry.send_to("bob", chat("gone")).await,
            Err(RegistryError::NotConnected("bob".to_string()))
        );
        assert!(!registry.is_connected("bob").await);
    }
}
