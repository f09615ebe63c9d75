use axum::{extract::State, response::IntoResponse};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath},
    models::chat::{CreateConversationRequest, SaveMessageRequest},
    routes::{created, data},
    services::{chat::ChatService, roles::Caller},
    AppState,
};

pub async fn list_conversations(State(state): State<AppState>, caller: Caller) -> AppResult<impl IntoResponse> {
    let conversations = ChatService::list(state.store.as_ref(), &caller).await?;
    Ok(data(conversations))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> AppResult<impl IntoResponse> {
    let conversation =
        ChatService::create(state.store.as_ref(), &state.clock, &caller, req.title.as_deref()).await?;
    Ok(created(conversation))
}

pub async fn list_messages(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let messages = ChatService::messages(state.store.as_ref(), &caller, id).await?;
    Ok(data(messages))
}

pub async fn save_message(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SaveMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let message =
        ChatService::save_message(state.store.as_ref(), &state.clock, &caller, id, req.role, &req.content).await?;
    Ok(created(message))
}
