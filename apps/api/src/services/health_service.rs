//! Health check endpoint for monitoring and load balancers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// `200` while the database answers, `503` otherwise.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database_ok = state.db.health_check().await;
    let timestamp = Utc::now().to_rfc3339();

    if database_ok {
        (
            StatusCode::OK,
            Json(json!({ "status": "OK", "database": "connected", "timestamp": timestamp })),
        )
    } else {
        warn!("Health check failed: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "ERROR", "database": "disconnected", "timestamp": timestamp })),
        )
    }
}
