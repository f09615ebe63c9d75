pub mod chat;
pub mod documents;
pub mod health;
pub mod invitations;
pub mod metrics;
pub mod profile;
pub mod schools;
pub mod sessions;
pub mod students;

use axum::{
    http::{header, HeaderMap, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::AppResult,
    middleware::{
        auth::JwtSecret,
        rate_limit::{check_rate_limit, client_key, ONBOARDING_MAX_REQUESTS, ONBOARDING_WINDOW_SECS},
    },
    AppState,
};

/// Success body: `{ "data": ... }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub fn data<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope { data }))
}

/// Per-client throttle for the onboarding endpoints. A no-op without Redis.
pub async fn throttle(state: &AppState, headers: &HeaderMap, scope: &str) -> AppResult<()> {
    let key = format!("throttle:{scope}:{}", client_key(headers));
    check_rate_limit(state.redis.as_ref(), &key, ONBOARDING_MAX_REQUESTS, ONBOARDING_WINDOW_SECS).await
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(AllowOrigin::any());

    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Profile
        .route("/me", get(profile::me))
        .route("/profile", put(profile::upsert_profile))
        // Schools
        .route("/schools", post(schools::register_school))
        .route("/schools/join", post(schools::join_school))
        .route("/schools/{id}", get(schools::get_school))
        .route("/schools/{id}/code", post(schools::generate_code))
        .route("/schools/{id}/teachers", get(schools::list_teachers))
        .route("/schools/{id}/teachers/{teacher_id}/supervisor", put(schools::set_supervisor))
        .route("/schools/{id}/students", get(schools::list_students))
        .route("/schools/{id}/usage", get(sessions::usage_summary))
        // Students
        .route("/students/{id}/approve", post(students::approve_student))
        .route("/students/{id}", delete(students::revoke_student))
        // Invitations
        .route("/schools/{id}/invitations/teachers", post(invitations::invite_teacher))
        .route("/schools/{id}/invitations/students", post(invitations::invite_student))
        .route("/schools/{id}/invitations", get(invitations::list_invitations))
        .route("/invitations/verify", get(invitations::verify_invitation))
        .route("/invitations/accept", post(invitations::accept_invitation))
        .route("/invitations/{id}", delete(invitations::cancel_invitation))
        // Chat
        .route("/conversations", get(chat::list_conversations).post(chat::create_conversation))
        .route("/conversations/{id}/messages", get(chat::list_messages).post(chat::save_message))
        // Documents
        .route("/documents", get(documents::list_documents).post(documents::register_document))
        .route("/documents/{id}", delete(documents::delete_document))
        // Session logs
        .route("/sessions", post(sessions::start_session))
        .route("/sessions/{id}/end", post(sessions::end_session))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
