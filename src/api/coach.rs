use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};

use super::extract::{ValidatedJson, ValidatedQuery};
use super::AppState;
use crate::auth::{require_role, CsrfProtected, CurrentUser, MessageResponse, UserRole};
use crate::error::{AppError, AppResult};
use crate::models::{
    AcceptInviteRequest, CoachAthletesResponse, CoachInviteRequest, CoachInviteResponse, LeaderboardQuery,
    LeaderboardResponse,
};

pub fn coach_routes() -> Router<AppState> {
    Router::new()
        .route("/invite", post(invite_athlete))
        .route("/accept", post(accept_invite))
        .route("/athletes", get(list_athletes))
        .route("/leaderboard", get(leaderboard))
}

#[tracing::instrument(skip(state, current, request))]
async fn invite_athlete(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<CoachInviteRequest>,
) -> AppResult<Json<CoachInviteResponse>> {
    require_role(&current.user, UserRole::Coach)?;
    Ok(Json(
        state
            .coach
            .invite_athlete(&current.user, &request.athlete_email)
            .await?,
    ))
}

#[tracing::instrument(skip(state, current, request))]
async fn accept_invite(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<AcceptInviteRequest>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.coach.accept_invite(&current.user, &request.invite_code)))
}

#[tracing::instrument(skip(state, current))]
async fn list_athletes(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<CoachAthletesResponse>> {
    require_role(&current.user, UserRole::Coach)?;
    let athletes = state.coach.list_athletes(current.user.id).await?;
    Ok(Json(CoachAthletesResponse { athletes }))
}

#[tracing::instrument(skip(state, current))]
async fn leaderboard(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedQuery(query): ValidatedQuery<LeaderboardQuery>,
) -> AppResult<Json<LeaderboardResponse>> {
    if !current.user.is_coach() {
        return Err(AppError::forbidden("Only coaches can access leaderboard"));
    }

    Ok(Json(
        state
            .leaderboard
            .leaderboard(current.user.id, &query.range)
            .await?,
    ))
}
