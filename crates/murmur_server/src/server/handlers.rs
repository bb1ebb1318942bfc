//! Per-connection WebSocket handling.

use crate::connection::{ConnectionManager, ConnectionRouter};
use crate::error::ServerError;
use crate::messaging::route_client_message;
use futures::{SinkExt, StreamExt};
use murmur_proximity::{EventHandler, OutboundEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, trace, warn};

/// Drives one client connection from handshake to disconnect.
///
/// Inbound frames are handled in arrival order. Outbound frames flow through
/// an unbounded queue into a dedicated writer task. When the socket closes,
/// every client id this connection still owns is removed from the
/// proximity state.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    handler: EventHandler<ConnectionRouter>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed for {addr}: {e}")))?;
    let (mut ws_sink, mut ws_receiver) = ws_stream.split();

    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();
    let connection_id = connection_manager.add_connection(addr, sender).await;

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = ws_sink.send(message).await {
                warn!("Write to {} failed: {}", addr, e);
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                match route_client_message(text.as_str(), connection_id, &connection_manager, &handler).await {
                    Ok(handled) => trace!("Connection {}: {:?}", connection_id, handled),
                    Err(e) => {
                        warn!("Rejected frame from connection {}: {}", connection_id, e);
                        match serde_json::to_string(&OutboundEvent::Error(e.to_string())) {
                            Ok(reply) => {
                                connection_manager.send_to_connection(connection_id, &reply).await;
                            }
                            Err(e) => error!("Failed to serialize error reply: {}", e),
                        }
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            // tungstenite answers pings itself
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for connection {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Dropping the manager's sender ends the writer once its queue drains.
    let handler = &handler;
    connection_manager
        .release_connection(connection_id, |released| async move {
            handler.disconnect(&released).await
        })
        .await;
    if let Err(e) = writer.await {
        error!("Writer task for connection {} panicked: {}", connection_id, e);
    }
    Ok(())
}
