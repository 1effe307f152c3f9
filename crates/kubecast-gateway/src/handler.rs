//! Upgrade endpoint and shared gateway state.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use kubecast_core::Broadcaster;
use tracing::{debug, warn};

use crate::connection::handle_connection;
use crate::settings::HeartbeatSettings;

/// Route serving the resource event stream.
pub const RESOURCES_PATH: &str = "/v1/websockets/resources";

/// Inbound frames are discarded, so there is no reason to accept big ones.
const MAX_INBOUND_MESSAGE_BYTES: usize = 64 * 1024;

/// State shared by every gateway connection.
#[derive(Debug, Clone)]
pub struct GatewayState {
    broadcaster: Broadcaster,
    settings: HeartbeatSettings,
}

impl GatewayState {
    /// Gateway over `broadcaster`
    #[must_use]
    pub fn new(broadcaster: Broadcaster, settings: HeartbeatSettings) -> Self {
        Self {
            broadcaster,
            settings,
        }
    }

    /// Broadcaster new connections subscribe to
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Heartbeat settings applied to new connections
    #[must_use]
    pub fn settings(&self) -> HeartbeatSettings {
        self.settings
    }
}

/// WebSocket upgrade handler for [`RESOURCES_PATH`].
///
/// A failed upgrade is answered by axum and never reaches the broadcaster.
pub async fn resources_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    debug!("Upgrading connection to websocket");
    ws.max_message_size(MAX_INBOUND_MESSAGE_BYTES)
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_connection(socket, state.broadcaster, state.settings))
}

/// Router exposing the resource stream.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(RESOURCES_PATH, get(resources_ws_handler))
        .with_state(state)
}
