use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::session_log::{StartSessionRequest, UsageQuery},
    routes::{created, data},
    services::{roles::Caller, sessions::SessionService},
    AppState,
};

/// POST /sessions
pub async fn start_session(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<StartSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let session = SessionService::start(state.store.as_ref(), &state.clock, &caller, &req.activity).await?;
    Ok(created(session))
}

/// POST /sessions/{id}/end
pub async fn end_session(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let session = SessionService::end(state.store.as_ref(), &state.clock, &caller, id).await?;
    Ok(data(session))
}

/// GET /schools/{id}/usage?days=
pub async fn usage_summary(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<UsageQuery>,
) -> AppResult<impl IntoResponse> {
    let summary = SessionService::usage_summary(state.store.as_ref(), &state.clock, &caller, id, q.days).await?;
    Ok(data(summary))
}
