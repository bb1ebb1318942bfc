//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize the broadcast server.

use murmur_proximity::{MessageLimits, ProximitySettings};
use std::net::SocketAddr;

/// Configuration structure for the broadcast server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Radius, re-index threshold and index strategy
    pub proximity: ProximitySettings,

    /// Content rules for outgoing messages
    pub limits: MessageLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            proximity: ProximitySettings::default(),
            limits: MessageLimits::default(),
        }
    }
}
