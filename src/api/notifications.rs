use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};

use super::extract::ValidatedJson;
use super::AppState;
use crate::auth::{CsrfProtected, CurrentUser};
use crate::error::AppResult;
use crate::models::{NotificationPrefsResponse, TestNotificationResponse, UpdateNotificationPrefs};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/prefs", get(get_prefs).patch(update_prefs))
        .route("/test", post(send_test_notification))
}

#[tracing::instrument(skip(state, current))]
async fn get_prefs(State(state): State<AppState>, current: CurrentUser) -> AppResult<Json<NotificationPrefsResponse>> {
    Ok(Json(state.notifications.get_prefs(current.user.id).await?))
}

#[tracing::instrument(skip(state, current, request))]
async fn update_prefs(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<UpdateNotificationPrefs>,
) -> AppResult<Json<NotificationPrefsResponse>> {
    Ok(Json(state.notifications.update_prefs(current.user.id, request).await?))
}

#[tracing::instrument(skip(state, current))]
async fn send_test_notification(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
) -> AppResult<Json<TestNotificationResponse>> {
    Ok(Json(state.notifications.send_test_notification(&current.user).await?))
}
