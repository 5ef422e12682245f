use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use super::AppState;
use crate::metrics;

pub fn platform_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "PunchTracker API" }))
}

/// Liveness only; does not touch the database
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, metrics::CONTENT_TYPE)], state.metrics.render())
}
