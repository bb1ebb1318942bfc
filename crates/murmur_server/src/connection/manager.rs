//! Connection tracking and client id routing.

use super::client::ClientConnection;
use super::ConnectionId;
use murmur_proximity::ClientId;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct ConnectionTable {
    connections: HashMap<ConnectionId, ClientConnection>,
    /// Client id to the connection that most recently acted as it
    routes: HashMap<ClientId, ConnectionId>,
}

/// Tracks live connections and which client ids each one speaks for.
///
/// Both maps sit under one lock so a route never points at a connection that
/// has already been removed.
///
/// Lock order is this table, then the proximity state. Nothing may wait on
/// the table while holding the state lock.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    table: RwLock<ConnectionTable>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its id.
    pub async fn add_connection(
        &self,
        remote_addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let mut table = self.table.write().await;
        table
            .connections
            .insert(connection_id, ClientConnection::new(remote_addr, sender));
        info!("🔗 Connection {} established from {}", connection_id, remote_addr);
        connection_id
    }

    /// Records that `connection_id` acts as `client_id` and routes the id to it.
    pub async fn bind_client(&self, connection_id: ConnectionId, client_id: &ClientId) {
        let mut table = self.table.write().await;
        let Some(connection) = table.connections.get_mut(&connection_id) else {
            return;
        };
        if connection.client_ids.insert(client_id.clone()) {
            debug!("Connection {} now speaks for client {}", connection_id, client_id);
        }
        table.routes.insert(client_id.clone(), connection_id);
    }

    /// Drops the connection and returns the client ids it still owned.
    ///
    /// Ids that a newer connection has since claimed stay routed there and
    /// are not returned.
    pub async fn remove_connection(&self, connection_id: ConnectionId) -> Vec<ClientId> {
        self.release_connection(connection_id, std::future::ready).await
    }

    /// Drops the connection and hands the ids it still owned to `release`.
    ///
    /// The table stays write-locked until `release` completes, so no other
    /// connection can claim one of those ids in between. `release` must not
    /// call back into the manager.
    pub async fn release_connection<F, Fut, T>(&self, connection_id: ConnectionId, release: F) -> T
    where
        F: FnOnce(Vec<ClientId>) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut table = self.table.write().await;
        let owned = match table.connections.remove(&connection_id) {
            Some(connection) => {
                let owned: Vec<ClientId> = connection
                    .client_ids
                    .into_iter()
                    .filter(|id| table.routes.get(id) == Some(&connection_id))
                    .collect();
                for id in &owned {
                    table.routes.remove(id);
                }
                info!(
                    "🔌 Connection {} from {} closed ({} client id(s) released)",
                    connection_id,
                    connection.remote_addr,
                    owned.len()
                );
                owned
            }
            None => Vec::new(),
        };
        let released = release(owned).await;
        drop(table);
        released
    }

    /// Queues `text` for the connection routed to `client_id`.
    ///
    /// Returns `false` when no live connection speaks for the id.
    pub async fn send_to_client(&self, client_id: &ClientId, text: &str) -> bool {
        let table = self.table.read().await;
        table
            .routes
            .get(client_id)
            .and_then(|connection_id| table.connections.get(connection_id))
            .is_some_and(|connection| connection.send_text(text))
    }

    /// Queues `text` for a specific connection.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, text: &str) -> bool {
        let table = self.table.read().await;
        table
            .connections
            .get(&connection_id)
            .is_some_and(|connection| connection.send_text(text))
    }

    pub async fn connection_count(&self) -> usize {
        self.table.read().await.connections.len()
    }

    pub async fn connection_for(&self, client_id: &ClientId) -> Option<ConnectionId> {
        self.table.read().await.routes.get(client_id).copied()
    }
}
