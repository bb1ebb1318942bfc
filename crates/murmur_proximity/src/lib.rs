//! # Murmur Proximity
//!
//! The spatial core of the Murmur broadcast server. Clients report where they
//! are; a message is delivered only to clients within a fixed great-circle
//! radius of its sender.
//!
//! ## Components
//!
//! * [`geo`] - positions and the haversine [`distance`] metric
//! * [`spatial`] - the [`SpatialIndex`] trait with ball-tree, octree and
//!   quadtree strategies
//! * [`ClientRegistry`] - authoritative id to position map
//! * [`UpdatePolicy`] - ignores movement below a threshold, otherwise
//!   re-indexes with remove-then-insert
//! * [`ProximityMatcher`] - "who is near me", via the index or a linear scan
//! * [`ProximityState`] - all of the above behind one lock
//! * [`EventHandler`] - turns inbound events into routed notifications
//!
//! ## Message Flow
//!
//! 1. The transport decodes a frame into an [`InboundEvent`]
//! 2. The handler resolves the client id and applies the position report
//! 3. For `send` and `status`, targets are resolved under the same lock
//! 4. The lock is released and the [`MessageRouter`] delivers
//!
//! ```rust
//! use murmur_proximity::{ClientId, Position, ProximityState};
//!
//! # tokio_test_block(async {
//! let state = ProximityState::default();
//! let a = ClientId::from("a");
//! state.report_position(&a, Position::new(0.0, 0.0)).await;
//! state.report_position(&ClientId::from("b"), Position::new(0.0, 0.001)).await;
//! assert_eq!(state.nearby_count(&a).await, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```

pub mod error;
pub mod events;
pub mod geo;
pub mod handlers;
pub mod matcher;
pub mod policy;
pub mod registry;
pub mod router;
pub mod spatial;
pub mod state;

pub use error::{ProximityError, ValidationError};
pub use events::{InboundEvent, MessageLimits, OutboundEvent, MAX_MESSAGE_CHARS};
pub use geo::{distance, ClientId, Position, EARTH_RADIUS_M};
pub use handlers::{EventHandler, Handled};
pub use matcher::{ProximityMatcher, RANGE_M};
pub use policy::{UpdateOutcome, UpdatePolicy, UPDATE_RANGE_M};
pub use registry::{ClientNode, ClientRegistry};
pub use router::MessageRouter;
pub use spatial::{create_index, IndexHandle, IndexKind, SpatialIndex};
pub use state::{ProximitySettings, ProximityState};
