//! Client connection representation.

use murmur_proximity::ClientId;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Represents an individual client connection to the server.
///
/// Outbound frames go through `sender` to the connection's writer task, so
/// delivering never waits on another client's socket.
#[derive(Debug)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,

    /// Queue drained by the connection's writer task
    pub sender: mpsc::UnboundedSender<Message>,

    /// Every client id this connection has acted as
    pub client_ids: HashSet<ClientId>,
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            remote_addr,
            connected_at: SystemTime::now(),
            sender,
            client_ids: HashSet::new(),
        }
    }

    /// Queues a text frame. `false` if the writer has already gone away.
    pub fn send_text(&self, text: &str) -> bool {
        self.sender.send(Message::text(text.to_owned())).is_ok()
    }
}
