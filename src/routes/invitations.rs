use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::invitation::{
        AcceptInvitationRequest, InvitationQuery, InviteStudentRequest, InviteTeacherRequest,
        VerifyInvitationQuery,
    },
    routes::{created, data, throttle},
    services::{invitations::InvitationService, roles::Caller},
    AppState,
};

/// POST /schools/{id}/invitations/teachers
pub async fn invite_teacher(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<InviteTeacherRequest>,
) -> AppResult<impl IntoResponse> {
    let issued = InvitationService::invite_teacher(
        state.store.as_ref(),
        &state.clock,
        &state.notifications,
        &caller,
        id,
        &req.email,
    )
    .await?;
    Ok(created(issued))
}

/// POST /schools/{id}/invitations/students
pub async fn invite_student(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<InviteStudentRequest>,
) -> AppResult<impl IntoResponse> {
    let issued = InvitationService::invite_student(
        state.store.as_ref(),
        &state.clock,
        &state.notifications,
        &caller,
        id,
        req.method,
        req.email.as_deref(),
    )
    .await?;
    Ok(created(issued))
}

/// GET /schools/{id}/invitations?status=
pub async fn list_invitations(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<InvitationQuery>,
) -> AppResult<impl IntoResponse> {
    let invitations = InvitationService::list(state.store.as_ref(), &caller, id, q.status).await?;
    Ok(data(invitations))
}

/// DELETE /invitations/{id}
pub async fn cancel_invitation(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<StatusCode> {
    InvitationService::cancel(state.store.as_ref(), &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /invitations/verify?token=
pub async fn verify_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    _caller: Caller,
    ApiQuery(q): ApiQuery<VerifyInvitationQuery>,
) -> AppResult<impl IntoResponse> {
    throttle(&state, &headers, "verify").await?;
    let verification = InvitationService::verify(state.store.as_ref(), &state.clock, &q.token).await?;
    Ok(data(verification))
}

/// POST /invitations/accept
pub async fn accept_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    caller: Caller,
    ApiJson(req): ApiJson<AcceptInvitationRequest>,
) -> AppResult<impl IntoResponse> {
    throttle(&state, &headers, "accept").await?;
    let accepted = InvitationService::accept(
        state.store.as_ref(),
        &state.clock,
        &caller,
        &req.token,
        req.full_name.as_deref(),
    )
    .await?;
    Ok(data(accepted))
}
