//! Message type definitions for client-server communication.
//!
//! Every text frame is a JSON envelope naming the event and carrying its
//! payload:
//!
//! ```json
//! { "event": "send", "data": { "id": "alice", "lat": 51.5, "lon": -0.12, "msg": "hi" } }
//! ```
//!
//! `id` is optional everywhere; the connection id is used when it is absent.

use murmur_proximity::{ClientId, InboundEvent, Position, ProximityError};
use serde::{Deserialize, Serialize};

/// A position report as it arrives on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionReport {
    #[serde(default)]
    pub id: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// A chat message plus the sender's current position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReport {
    #[serde(default)]
    pub id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub msg: String,
}

/// A message sent from a client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    Join(PositionReport),
    Send(SendReport),
    Status(PositionReport),
}

impl ClientMessage {
    /// Validates coordinates and converts into the core event.
    pub fn into_event(self) -> Result<InboundEvent, ProximityError> {
        Ok(match self {
            ClientMessage::Join(report) => InboundEvent::Join {
                position: Position::try_new(report.lat, report.lon)?,
                id: report.id.map(ClientId::from),
            },
            ClientMessage::Send(report) => InboundEvent::Send {
                position: Position::try_new(report.lat, report.lon)?,
                id: report.id.map(ClientId::from),
                msg: report.msg,
            },
            ClientMessage::Status(report) => InboundEvent::Status {
                position: Position::try_new(report.lat, report.lon)?,
                id: report.id.map(ClientId::from),
            },
        })
    }
}
