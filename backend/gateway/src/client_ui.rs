//! Client page hand-off.
//!
//! The browser client does all cryptography; the relay only serves its page.

use axum::Router;
use std::path::Path;
use tower_http::services::ServeFile;

use crate::server::GatewayState;

/// Router serving the client page at `/`. Missing files answer 404.
pub fn client_router(index: &Path) -> Router<GatewayState> {
    Router::new().route_service("/", ServeFile::new(index))
}
