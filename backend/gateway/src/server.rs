//! Main HTTP Gateway Server.

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use crate::client_ui;
use crate::health_api;
use crate::relay::Relay;
use crate::ws_server;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub relay: Relay,
    pub index_path: PathBuf,
}

impl GatewayState {
    pub fn new(relay: Relay, index_path: impl Into<PathBuf>) -> Self {
        Self {
            relay,
            index_path: index_path.into(),
        }
    }
}

/// Build the gateway router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws_server::ws_handler))
        .route("/api/health", get(health_api::get_health))
        .merge(client_ui::client_router(&state.index_path))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the main Axum HTTP server for the gateway.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Gateway HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
