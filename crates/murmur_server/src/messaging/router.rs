//! Routing of inbound frames to the proximity event handler.

use crate::connection::{ConnectionId, ConnectionManager, ConnectionRouter};
use crate::error::ServerError;
use crate::messaging::ClientMessage;
use murmur_proximity::{EventHandler, Handled};
use tracing::debug;

/// Parses a text frame and dispatches it.
///
/// # Message Flow
///
/// 1. Parse the frame as a [`ClientMessage`] envelope
/// 2. Validate coordinates and convert into an inbound event
/// 3. Resolve the client id (explicit id, else the connection id)
/// 4. Bind that id to this connection so replies can reach it
/// 5. Hand the event to the proximity handler
///
/// Parse and validation failures come back as [`ServerError::Protocol`]; the
/// caller reports them to the originating connection only.
pub async fn route_client_message(
    text: &str,
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    handler: &EventHandler<ConnectionRouter>,
) -> Result<Handled, ServerError> {
    let message: ClientMessage = serde_json::from_str(text)
        .map_err(|e| ServerError::Protocol(format!("Invalid message: {e}")))?;
    let event = message
        .into_event()
        .map_err(|e| ServerError::Protocol(e.to_string()))?;

    let client = event.client_id(&connection_id.as_client_id());
    connection_manager.bind_client(connection_id, &client).await;

    debug!(
        "📨 Routing '{}' from client {} on connection {}",
        event.name(),
        client,
        connection_id
    );
    Ok(handler.dispatch(&client, event).await)
}
