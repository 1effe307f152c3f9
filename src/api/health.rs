//! Health and readiness probes.
//!
//! - `/health` — process is up, with broadcaster statistics
//! - `/readiness` — 503 once the broadcaster has expired and no longer
//!   accepts subscribers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use kubecast_core::Broadcaster;
use serde::Serialize;

/// Probe response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub subscribers: usize,
    pub expired: bool,
}

impl HealthResponse {
    fn from_broadcaster(broadcaster: &Broadcaster) -> Self {
        let expired = broadcaster.expired();
        Self {
            status: if expired { "unavailable" } else { "healthy" },
            version: env!("CARGO_PKG_VERSION"),
            subscribers: broadcaster.pool_size(),
            expired,
        }
    }
}

/// Probe routes
pub fn health_routes(broadcaster: Broadcaster) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readiness", get(readiness))
        .with_state(broadcaster)
}

async fn health(State(broadcaster): State<Broadcaster>) -> Json<HealthResponse> {
    Json(HealthResponse::from_broadcaster(&broadcaster))
}

async fn readiness(State(broadcaster): State<Broadcaster>) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse::from_broadcaster(&broadcaster);
    let status = if response.expired {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}
