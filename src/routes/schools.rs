use axum::{extract::State, http::HeaderMap, response::IntoResponse};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        school::{JoinSchoolRequest, RegisterSchoolRequest},
        user::{SetSupervisorRequest, StudentQuery},
    },
    routes::{created, data, throttle},
    services::{
        codes::SchoolCodeService,
        roles::Caller,
        schools::SchoolService,
        students::StudentService,
        teachers::TeacherService,
    },
    AppState,
};

/// POST /schools
pub async fn register_school(
    State(state): State<AppState>,
    headers: HeaderMap,
    caller: Caller,
    ApiJson(req): ApiJson<RegisterSchoolRequest>,
) -> AppResult<impl IntoResponse> {
    throttle(&state, &headers, "register").await?;
    let registered =
        SchoolService::register(state.store.as_ref(), &state.clock, &caller, &req.name, &req.full_name).await?;
    Ok(created(registered))
}

/// GET /schools/{id}
pub async fn get_school(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let school = SchoolService::get(state.store.as_ref(), &caller, id).await?;
    Ok(data(school))
}

/// POST /schools/{id}/code
pub async fn generate_code(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let code = SchoolCodeService::generate(state.store.as_ref(), &state.clock, &caller, id).await?;
    Ok(created(code))
}

/// POST /schools/join
pub async fn join_school(
    State(state): State<AppState>,
    headers: HeaderMap,
    caller: Caller,
    ApiJson(req): ApiJson<JoinSchoolRequest>,
) -> AppResult<impl IntoResponse> {
    throttle(&state, &headers, "join").await?;
    let student =
        SchoolService::join_with_code(state.store.as_ref(), &state.clock, &caller, &req.code, &req.full_name).await?;
    Ok(created(student))
}

/// GET /schools/{id}/teachers
pub async fn list_teachers(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<impl IntoResponse> {
    let teachers = TeacherService::list(state.store.as_ref(), &caller, id).await?;
    Ok(data(teachers))
}

/// PUT /schools/{id}/teachers/{teacher_id}/supervisor
pub async fn set_supervisor(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((id, teacher_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<SetSupervisorRequest>,
) -> AppResult<impl IntoResponse> {
    let teacher =
        TeacherService::set_supervisor(state.store.as_ref(), &caller, id, teacher_id, req.is_supervisor).await?;
    Ok(data(teacher))
}

/// GET /schools/{id}/students?status=
pub async fn list_students(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(q): ApiQuery<StudentQuery>,
) -> AppResult<impl IntoResponse> {
    let students = StudentService::list(state.store.as_ref(), &caller, id, q.status).await?;
    Ok(data(students))
}
