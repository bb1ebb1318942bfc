//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections, the mapping from
//! client ids to the connection that last used them, and outbound delivery.

pub mod client;
pub mod manager;
pub mod response;

pub use manager::ConnectionManager;
pub use response::ConnectionRouter;

use murmur_proximity::ClientId;
use std::fmt;
use uuid::Uuid;

/// Transport-assigned identifier for one WebSocket connection.
///
/// Its string form doubles as the client id for events that carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_client_id(&self) -> ClientId {
        ClientId::new(self.0.to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
