use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};

use super::extract::ValidatedJson;
use super::AppState;
use crate::auth::{CsrfProtected, CurrentUser};
use crate::error::AppResult;
use crate::models::{CreatePunchRequest, Punch};

pub fn punch_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_punch))
        .route("/session/:session_id", get(list_session_punches))
}

#[tracing::instrument(skip(state, current, request))]
async fn create_punch(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<CreatePunchRequest>,
) -> AppResult<Json<Punch>> {
    Ok(Json(state.punches.create_punch(current.user.id, request).await?))
}

#[tracing::instrument(skip(state, current))]
async fn list_session_punches(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(session_id): Path<i64>,
) -> AppResult<Json<Vec<Punch>>> {
    Ok(Json(
        state
            .punches
            .list_session_punches(current.user.id, session_id)
            .await?,
    ))
}
