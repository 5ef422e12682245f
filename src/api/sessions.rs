use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use super::extract::{ValidatedJson, ValidatedQuery};
use super::AppState;
use crate::auth::{CsrfProtected, CurrentUser};
use crate::error::AppResult;
use crate::models::{CreateSessionRequest, Pagination, Session, SessionList, UpdateSessionRequest};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route("/:session_id", get(get_session).patch(update_session))
}

#[tracing::instrument(skip(state, current))]
async fn list_sessions(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedQuery(page): ValidatedQuery<Pagination>,
) -> AppResult<Json<SessionList>> {
    Ok(Json(state.sessions.list_sessions(current.user.id, page).await?))
}

#[tracing::instrument(skip(state, current, request))]
async fn create_session(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<CreateSessionRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.sessions.create_session(current.user.id, request).await?))
}

#[tracing::instrument(skip(state, current))]
async fn get_session(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(session_id): Path<i64>,
) -> AppResult<Json<Session>> {
    Ok(Json(state.sessions.get_session(current.user.id, session_id).await?))
}

#[tracing::instrument(skip(state, current, request))]
async fn update_session(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    Path(session_id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateSessionRequest>,
) -> AppResult<Json<Session>> {
    Ok(Json(
        state
            .sessions
            .update_session(current.user.id, session_id, request)
            .await?,
    ))
}
