//! Convenience constructors.

use crate::{config::ServerConfig, server::MurmurServer};

/// Creates a server with default configuration: `127.0.0.1:8080`, ball-tree
/// index, 10 km range.
pub fn create_server() -> MurmurServer {
    MurmurServer::new(ServerConfig::default())
}

pub fn create_server_with_config(config: ServerConfig) -> MurmurServer {
    MurmurServer::new(config)
}
