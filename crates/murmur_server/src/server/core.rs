//! Core broadcast server implementation.
//!
//! `MurmurServer` owns the proximity state, the connection manager and the
//! event handler that ties them together, and runs the accept loop.

use crate::{
    config::ServerConfig,
    connection::{ConnectionManager, ConnectionRouter},
    error::ServerError,
    server::handlers::handle_connection,
};
use murmur_proximity::{EventHandler, ProximityState};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, warn};

/// The proximity broadcast server.
///
/// # Architecture
///
/// * **Proximity State**: registry and spatial index behind one lock
/// * **Connection Management**: WebSocket lifecycle and client id routing
/// * **Event Handler**: validation, targeting and delivery of client events
pub struct MurmurServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Registry and spatial index shared by every connection
    state: Arc<ProximityState>,

    /// Manager for client connections and messaging
    connection_manager: Arc<ConnectionManager>,

    /// Handler that turns inbound events into routed notifications
    handler: EventHandler<ConnectionRouter>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,

    /// One permit per allowed connection, held from accept until close
    connection_slots: Arc<Semaphore>,
}

impl MurmurServer {
    /// Creates a new server with the specified configuration.
    ///
    /// The spatial index strategy is taken from `config.proximity`.
    pub fn new(config: ServerConfig) -> Self {
        let state = Arc::new(ProximityState::new(config.proximity));
        let connection_manager = Arc::new(ConnectionManager::new());
        let (shutdown_sender, _) = broadcast::channel(1);

        let router = Arc::new(ConnectionRouter::new(connection_manager.clone()));
        let handler = EventHandler::new(state.clone(), router, config.limits);
        let connection_slots = Arc::new(Semaphore::new(config.max_connections));

        Self {
            config,
            state,
            connection_manager,
            handler,
            shutdown_sender,
            connection_slots,
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting broadcast server on {}", self.config.bind_address);
        info!(
            "🗺️ Using {} index, {} m range, {} m update threshold",
            self.config.proximity.index, self.config.proximity.range_m, self.config.proximity.update_range_m
        );

        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Creates the listening socket with `SO_REUSEADDR` set.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        std_listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))?;
        info!("✅ Listener bound on {}", address);
        Ok(listener)
    }

    /// Runs the accept loop on an already bound listener until
    /// [`shutdown`](Self::shutdown) is called.
    ///
    /// Connections beyond `max_connections` are closed right after accept.
    /// A slot is taken before the handshake starts, so pending handshakes
    /// count against the limit.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let Ok(slot) = self.connection_slots.clone().try_acquire_owned() else {
                        warn!(
                            "Refusing {}: all {} connection slots in use",
                            addr, self.config.max_connections
                        );
                        drop(stream);
                        continue;
                    };

                    let connection_manager = self.connection_manager.clone();
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, connection_manager, handler).await {
                            error!("Connection error: {}", e);
                        }
                        drop(slot);
                    });
                }
                _ = shutdown_receiver.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(
            "Server stopped with {} client(s) registered",
            self.state.client_count().await
        );
        Ok(())
    }

    /// Signals the accept loop to stop.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        // No receiver just means the loop is not running.
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<ProximityState> {
        self.state.clone()
    }

    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Slots left before new connections are refused
    pub fn available_slots(&self) -> usize {
        self.connection_slots.available_permits()
    }
}
