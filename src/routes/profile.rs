use axum::{extract::State, response::IntoResponse};

use crate::{
    error::AppResult,
    middleware::extract::ApiJson,
    models::user::UpsertProfileRequest,
    routes::data,
    services::{profiles::ProfileService, roles::Caller},
    AppState,
};

/// GET /me
pub async fn me(State(state): State<AppState>, caller: Caller) -> AppResult<impl IntoResponse> {
    let me = ProfileService::me(state.store.as_ref(), &caller).await?;
    Ok(data(me))
}

/// PUT /profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<UpsertProfileRequest>,
) -> AppResult<impl IntoResponse> {
    let profile = ProfileService::upsert(state.store.as_ref(), &caller, &req.full_name).await?;
    Ok(data(profile))
}
