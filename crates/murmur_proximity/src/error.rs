//! Error types for the proximity core.

use thiserror::Error;

/// Reasons an outgoing chat message is refused before routing.
///
/// The `Display` text is what the sender sees in its `bad` notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Cannot Send Empty Message")]
    Empty,
    #[error("Cannot Send Message Longer Than {max} Chars")]
    TooLong { max: usize },
}

/// Errors raised by the proximity core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProximityError {
    /// Latitude/longitude outside their valid ranges or not finite
    #[error("Invalid position: lat {lat}, lon {lon}")]
    InvalidPosition { lat: f64, lon: f64 },
    /// Message rejected by content validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}
