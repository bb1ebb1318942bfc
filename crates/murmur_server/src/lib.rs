//! # Murmur Server
//!
//! WebSocket transport for the Murmur proximity broadcast service. Clients
//! report their latitude and longitude; a message is delivered to every client
//! within range of its sender, the sender included.
//!
//! ## Message Flow
//!
//! 1. Client sends a text frame shaped `{"event": ..., "data": {...}}`
//! 2. The frame is parsed and its coordinates validated
//! 3. The client id (explicit, else the connection id) is bound to the connection
//! 4. The proximity handler updates the index and resolves targets
//! 5. Notifications go out through the [`connection::ConnectionManager`]
//!
//! ### Client Events
//!
//! * `join` - `{id?, lat, lon}` registers or repositions a client
//! * `send` - `{id?, lat, lon, msg}` repositions and broadcasts `msg`
//! * `status` - `{id?, lat, lon}` repositions and asks for a `nearby` count
//!
//! ### Server Events
//!
//! * `receive` - `{from, msg}` a message from a client in range
//! * `bad` - the reason a `send` was refused
//! * `nearby` - `{count}` clients in range, excluding the asker
//! * `error` - a frame could not be parsed
//!
//! ## Error Handling
//!
//! [`ServerError`] separates network failures, malformed client frames and
//! internal faults. Protocol errors are reported to the offending connection
//! and never close it.

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::MurmurServer;
pub use utils::{create_server, create_server_with_config};

pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod server;
pub mod utils;
