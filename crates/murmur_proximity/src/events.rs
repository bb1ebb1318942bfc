//! Inbound and outbound event records.
//!
//! These are transport-neutral; the server crate owns the wire envelope and
//! converts into [`InboundEvent`] after validating coordinates.

use crate::error::ValidationError;
use crate::geo::{ClientId, Position};
use serde::{Deserialize, Serialize};

/// Default maximum message length in characters
pub const MAX_MESSAGE_CHARS: usize = 256;

/// An event from a connected client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Join {
        id: Option<ClientId>,
        position: Position,
    },
    Send {
        id: Option<ClientId>,
        position: Position,
        msg: String,
    },
    Status {
        id: Option<ClientId>,
        position: Position,
    },
    Disconnect,
}

impl InboundEvent {
    /// The id this event acts for: the explicit one if present and
    /// non-empty, otherwise `connection_id`.
    pub fn client_id(&self, connection_id: &ClientId) -> ClientId {
        let explicit = match self {
            InboundEvent::Join { id, .. }
            | InboundEvent::Send { id, .. }
            | InboundEvent::Status { id, .. } => id.as_ref(),
            InboundEvent::Disconnect => None,
        };
        explicit
            .filter(|id| !id.as_str().is_empty())
            .cloned()
            .unwrap_or_else(|| connection_id.clone())
    }

    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Join { .. } => "join",
            InboundEvent::Send { .. } => "send",
            InboundEvent::Status { .. } => "status",
            InboundEvent::Disconnect => "disconnect",
        }
    }
}

/// A notification delivered to one or more clients.
///
/// Serializes as `{"event": "<name>", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// A chat message from a nearby client
    Receive { from: ClientId, msg: String },
    /// The sender's own message was rejected
    Bad(String),
    /// Reply to a status event: clients nearby, sender excluded
    Nearby { count: usize },
    /// The transport could not understand a frame
    Error(String),
}

/// Content rules applied to outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    pub max_chars: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_chars: MAX_MESSAGE_CHARS,
        }
    }
}

impl MessageLimits {
    /// Rejects empty messages and messages longer than `max_chars` characters.
    pub fn validate(&self, msg: &str) -> Result<(), ValidationError> {
        if msg.is_empty() {
            return Err(ValidationError::Empty);
        }
        if msg.chars().count() > self.max_chars {
            return Err(ValidationError::TooLong { max: self.max_chars });
        }
        Ok(())
    }
}
