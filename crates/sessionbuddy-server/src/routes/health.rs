//! Health check.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub const APP_NAME: &str = "Session Buddy";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "app": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
