use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{delete, post},
    Router,
};

use super::extract::ValidatedJson;
use super::AppState;
use crate::auth::{CsrfProtected, CurrentUser, MessageResponse};
use crate::error::AppResult;
use crate::models::{ApiKeyCreated, ApiKeySummary, CreateApiKeyRequest, IngestResult};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

pub fn device_routes() -> Router<AppState> {
    Router::new()
        .route("/keys", post(create_key).get(list_keys))
        .route("/keys/:key_id", delete(delete_key))
        .route("/ingest", post(ingest))
}

#[tracing::instrument(skip(state, current, request))]
async fn create_key(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    ValidatedJson(request): ValidatedJson<CreateApiKeyRequest>,
) -> AppResult<Json<ApiKeyCreated>> {
    Ok(Json(state.devices.create_key(current.user.id, &request.name).await?))
}

#[tracing::instrument(skip(state, current))]
async fn list_keys(State(state): State<AppState>, current: CurrentUser) -> AppResult<Json<Vec<ApiKeySummary>>> {
    Ok(Json(state.devices.list_keys(current.user.id).await?))
}

#[tracing::instrument(skip(state, current))]
async fn delete_key(
    State(state): State<AppState>,
    CsrfProtected(current): CsrfProtected,
    Path(key_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(state.devices.delete_key(current.user.id, key_id).await?))
}

/// Signed device upload; authenticated by API key and HMAC, not by session
#[tracing::instrument(skip(state, headers, body), fields(body_len = body.len()))]
async fn ingest(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Json<IngestResult>> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    Ok(Json(
        state
            .devices
            .ingest(header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER), &body)
            .await?,
    ))
}
