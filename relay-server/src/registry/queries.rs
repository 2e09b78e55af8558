//! Read-only registry queries

use super::{ConnectionInfo, ConnectionRegistry};

impl ConnectionRegistry {
    pub async fn is_connected(&self, login: &str) -> bool {
        self.connections.read().await.contains_key(login)
    }

    /// Logins with a live connection, sorted
    pub async fn connected_logins(&self) -> Vec<String> {
        let mut logins: Vec<String> = self.connections.read().await.keys().cloned().collect();
        logins.sort();
        logins
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Details of `login`'s live connection
    pub async fn connection_info(&self, login: &str) -> Option<ConnectionInfo> {
        self.connections
            .read()
            .await
            .get(login)
            .map(|entry| ConnectionInfo {
                connection_id: entry.connection_id,
                address: entry.address,
                login_time: entry.login_time,
            })
    }
}
