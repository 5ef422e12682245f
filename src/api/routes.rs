use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use super::analytics::analytics_routes;
use super::auth::auth_routes;
use super::coach::coach_routes;
use super::device::device_routes;
use super::health::platform_routes;
use super::notifications::notification_routes;
use super::punches::punch_routes;
use super::sessions::session_routes;
use super::workouts::workout_routes;
use super::AppState;
use crate::auth::{cors_layer, security_headers_layer};
use crate::middleware::track_metrics;

pub fn create_routes(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .merge(platform_routes())
        .nest("/auth", auth_routes())
        .nest("/api/sessions", session_routes())
        .nest("/api/punches", punch_routes())
        .nest("/api/analytics", analytics_routes())
        .nest("/api/workouts", workout_routes())
        .nest("/api/coach", coach_routes())
        .nest("/api/device", device_routes())
        .nest("/api/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(security_headers_layer())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
