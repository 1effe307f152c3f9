//! Server wiring
//!
//! Builds the broadcaster and its intake, mounts the gateway and probes, and
//! runs until a shutdown signal closes the intake.

mod config;
mod loader;

use anyhow::{Context, Result};
use axum::Router;
use kubecast_core::{intake, Broadcaster, Publisher};
use kubecast_gateway::{GatewayState, HeartbeatSettings};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::health::health_routes;
use crate::cli::Cli;

/// Run the server until shutdown
///
/// Resource watchers (`kubecast_core::ResourceNotifier`) attach to the intake
/// through clones of the [`Publisher`] created here; the server keeps the root
/// handle only so shutdown can close the intake.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = loader::load_config()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let heartbeat = config.gateway.heartbeat();
    if !heartbeat.is_consistent() {
        warn!(
            ?heartbeat,
            "Ping delays exceed the read deadline, healthy clients will be dropped"
        );
    }

    let (publisher, intake) = intake::channel(config.broadcast.intake_capacity);
    let broadcaster =
        Broadcaster::with_config(intake, config.broadcast.broadcaster_config());

    let app = build_router(broadcaster.clone(), heartbeat);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Kubecast listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(publisher, broadcaster))
        .await
        .context("Server error")?;

    info!("Kubecast stopped");
    Ok(())
}

fn build_router(broadcaster: Broadcaster, heartbeat: HeartbeatSettings) -> Router {
    Router::new()
        .merge(kubecast_gateway::router(GatewayState::new(
            broadcaster.clone(),
            heartbeat,
        )))
        .merge(health_routes(broadcaster))
        .layer(TraceLayer::new_for_http())
}

/// Wait for Ctrl+C, then close the intake so every stream ends with a
/// normal closure before the listener stops.
async fn shutdown_signal(publisher: Publisher, broadcaster: Broadcaster) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!(
        subscribers = broadcaster.pool_size(),
        "Shutdown requested, closing intake"
    );
    drop(publisher);
    broadcaster.wait_expired().await;
}
