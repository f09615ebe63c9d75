use axum::{extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath},
    models::document::RegisterDocumentRequest,
    routes::{created, data},
    services::{documents::DocumentService, roles::Caller},
    AppState,
};

pub async fn register_document(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<RegisterDocumentRequest>,
) -> AppResult<impl IntoResponse> {
    let document = DocumentService::register(state.store.as_ref(), &state.clock, &caller, req).await?;
    Ok(created(document))
}

pub async fn list_documents(State(state): State<AppState>, caller: Caller) -> AppResult<impl IntoResponse> {
    let documents = DocumentService::list(state.store.as_ref(), &caller).await?;
    Ok(data(documents))
}

pub async fn delete_document(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    DocumentService::delete(state.store.as_ref(), &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
