//! Error types for the transport layer.

use thiserror::Error;

/// Errors raised while accepting connections or handling frames.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related error (binding, handshake, socket failures)
    #[error("Network error: {0}")]
    Network(String),
    /// A frame that could not be understood; reported back to its sender
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Internal server error (invalid state, serialization failures)
    #[error("Internal error: {0}")]
    Internal(String),
}
