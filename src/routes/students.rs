use axum::{extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::ApiPath,
    routes::data,
    services::{roles::Caller, students::StudentService},
    AppState,
};

/// POST /students/{id}/approve
pub async fn approve_student(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let student = StudentService::approve(state.store.as_ref(), &caller, id).await?;
    Ok(data(student))
}

/// DELETE /students/{id}
pub async fn revoke_student(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    StudentService::revoke(state.store.as_ref(), &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
