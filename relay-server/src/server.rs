//! Listener and accept loop

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::connection::{ConnectionParams, handle_connection};
use crate::constants::ACCEPT_ERROR_BACKOFF;
use crate::db::Database;
use crate::error::RelayError;
use crate::registry::ConnectionRegistry;

/// A bound relay server, ready to accept clients
pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    db: Database,
    registry: ConnectionRegistry,
}

impl Server {
    /// Validate `config` and bind its address
    pub async fn bind(config: ServerConfig, db: Database) -> Result<Self, RelayError> {
        config.validate()?;
        let listener = TcpListener::bind(config.socket_addr()).await?;
        Ok(Self::from_listener(listener, config, db))
    }

    /// Serve on an already bound listener
    ///
    /// `config`'s bind address and port are ignored.
    pub fn from_listener(listener: TcpListener, config: ServerConfig, db: Database) -> Self {
        let registry = ConnectionRegistry::with_queue_capacity(config.queue_capacity);
        Self {
            listener,
            config: Arc::new(config),
            db,
            registry,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The registry of live connections, for observers
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Accept clients until `shutdown` completes
    ///
    /// On shutdown the listener is closed, every worker is signalled and its
    /// queue dropped, and workers still running after the grace period are
    /// aborted.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            config,
            db,
            registry,
        } = self;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                accepted = listener.accept() => {
                    match accepted {
                        Ok((socket, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "accepted connection");
                            let params = ConnectionParams {
                                peer_addr,
                                registry: registry.clone(),
                                db: db.clone(),
                                config: config.clone(),
                                shutdown: shutdown_rx.clone(),
                            };
                            workers.spawn(async move {
                                if let Err(e) = handle_connection(socket, params).await {
                                    tracing::debug!(peer = %peer_addr, error = %e, "connection ended");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }

                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        tracing::error!(error = %e, "connection worker panicked");
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(connections = workers.len(), "shutting down");

        // Nothing to notify if every worker already finished
        let _ = shutdown_tx.send(true);
        registry.close_all().await;

        let drained = tokio::time::timeout(config.shutdown_grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = workers.len(),
                "grace period elapsed, aborting connections"
            );
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        Ok(())
    }
}
