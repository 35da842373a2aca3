//! Gateway Health API

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub sessions: usize,
    pub keyed_sessions: usize,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    let registry = state.relay.registry();
    Json(HealthReport {
        status: "ok".into(),
        service: "keyrelay".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: registry.len().await,
        keyed_sessions: registry.keyed_len().await,
        timestamp: Utc::now(),
    })
}
