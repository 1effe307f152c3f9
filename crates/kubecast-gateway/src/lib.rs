//! Kubecast Gateway - WebSocket delivery of broadcast envelopes
//!
//! Each upgraded connection is bound to one broadcaster subscription:
//! - Handler: the axum upgrade endpoint and shared gateway state
//! - Connection: write loop and heartbeat loop for one socket
//! - Lifecycle: per-connection state machine
//! - Settings: heartbeat cadence and deadlines
//! - Error: connection-level errors
//!
//! ## Usage
//!
//! ```ignore
//! use kubecast_core::{intake, Broadcaster};
//! use kubecast_gateway::{router, GatewayState, HeartbeatSettings};
//!
//! let (publisher, rx) = intake::channel(64);
//! let state = GatewayState::new(Broadcaster::new(rx), HeartbeatSettings::default());
//! let app = router(state);
//! ```
//!
//! ## Wire protocol
//!
//! Text frames carry `{"kind": .., "operation": .., "payload": ..}`. The
//! server pings shortly after connecting and again after every pong; a peer
//! that stops answering is dropped once the read deadline passes. Inbound text
//! frames are ignored.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod settings;

pub use connection::handle_connection;
pub use error::{GatewayError, Result};
pub use handler::{resources_ws_handler, router, GatewayState, RESOURCES_PATH};
pub use lifecycle::{ConnectionState, Lifecycle};
pub use settings::HeartbeatSettings;
