//! `MessageRouter` implementation over live connections.
//!
//! This bridges the proximity core and the connection manager: the core
//! resolves which client ids should hear an event, this delivers it.

use super::manager::ConnectionManager;
use async_trait::async_trait;
use murmur_proximity::{ClientId, MessageRouter, OutboundEvent};
use std::sync::Arc;
use tracing::{debug, error};

/// Routes outbound events to whichever connection speaks for each client id.
#[derive(Clone, Debug)]
pub struct ConnectionRouter {
    connection_manager: Arc<ConnectionManager>,
}

impl ConnectionRouter {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[async_trait]
impl MessageRouter for ConnectionRouter {
    /// Serializes once and queues the frame for every live target.
    ///
    /// Targets without a live connection are dropped silently.
    async fn route(&self, targets: &[ClientId], event: &OutboundEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize outbound event: {}", e);
                return;
            }
        };

        for target in targets {
            if !self.connection_manager.send_to_client(target, &payload).await {
                debug!("Dropping delivery to disconnected client {}", target);
            }
        }
    }
}
