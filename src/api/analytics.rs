use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use super::AppState;
use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::{SessionAnalytics, WeeklyAnalytics};

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/weekly", get(weekly_analytics))
        .route("/:session_id", get(session_analytics))
}

#[tracing::instrument(skip(state, current))]
async fn weekly_analytics(State(state): State<AppState>, current: CurrentUser) -> AppResult<Json<WeeklyAnalytics>> {
    Ok(Json(state.analytics.weekly_analytics(current.user.id).await?))
}

#[tracing::instrument(skip(state, current))]
async fn session_analytics(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(session_id): Path<i64>,
) -> AppResult<Json<SessionAnalytics>> {
    Ok(Json(
        state
            .analytics
            .session_analytics(current.user.id, session_id)
            .await?,
    ))
}
