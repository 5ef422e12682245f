use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::collections::BTreeMap;

use super::extract::ValidatedQuery;
use super::AppState;
use crate::auth::{CsrfProtected, CurrentUser};
use crate::error::AppResult;
use crate::models::{
    ActiveWorkout, Pagination, StartWorkoutRequest, WorkoutList, WorkoutStartResponse, WorkoutSummary,
    WorkoutTemplate,
};

pub fn workout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workouts))
        .route("/templates", get(list_templates))
        .route("/start", post(start_workout))
        .route("/stop", post(stop_workout))
        .route("/active", get(active_workout))
        .route("/:workout_id/summary", get(workout_summary))
}

async fn list_templates(State(state): State<AppState>) -> Json<BTreeMap<&'static str, WorkoutTemplate>> {
    Json(state.workouts.templates())
}

/// The body is optional; without a template the workout has no planned segments
#[tracing::instrument(skip(state, current, request))]
async fn start_workout(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    request: Option<Json<StartWorkoutRequest>>,
) -> AppResult<Json<WorkoutStartResponse>> {
    let Json(request) = request.unwrap_or_default();
    Ok(Json(
        state
            .workouts
            .start_workout(current.user.id, request.template_name.as_deref())
            .await?,
    ))
}

#[tracing::instrument(skip(state, current))]
async fn stop_workout(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
) -> AppResult<Json<ActiveWorkout>> {
    Ok(Json(state.workouts.stop_workout(current.user.id).await?))
}

#[tracing::instrument(skip(state, current))]
async fn active_workout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Option<ActiveWorkout>>> {
    let active = state.workouts.active_workout(current.user.id).await?;
    Ok(Json(active.as_ref().map(ActiveWorkout::from)))
}

#[tracing::instrument(skip(state, current))]
async fn list_workouts(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedQuery(page): ValidatedQuery<Pagination>,
) -> AppResult<Json<WorkoutList>> {
    Ok(Json(state.workouts.list_workouts(current.user.id, page).await?))
}

#[tracing::instrument(skip(state, current))]
async fn workout_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(workout_id): Path<i64>,
) -> AppResult<Json<WorkoutSummary>> {
    Ok(Json(
        state
            .workouts
            .workout_summary(current.user.id, workout_id)
            .await?,
    ))
}
