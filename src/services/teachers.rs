use uuid::Uuid;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::user::{MemberSummary, Teacher},
    services::roles::Caller,
};

pub struct TeacherService;

impl TeacherService {
    pub async fn list(store: &dyn Store, caller: &Caller, school_id: Uuid) -> AppResult<Vec<MemberSummary>> {
        if !caller.can_manage_students(school_id) {
            return Err(AppError::forbidden("Only staff can list teachers"));
        }
        store.list_teachers(school_id).await
    }

    /// Grants or removes the supervisor flag. Administrators only.
    pub async fn set_supervisor(
        store: &dyn Store,
        caller: &Caller,
        school_id: Uuid,
        teacher_id: Uuid,
        is_supervisor: bool,
    ) -> AppResult<Teacher> {
        if !caller.is_admin_of(school_id) {
            return Err(AppError::forbidden("Only administrators can change supervisors"));
        }
        let teacher = store
            .get_teacher(teacher_id)
            .await?
            .filter(|t| t.school_id == school_id)
            .ok_or_else(|| AppError::not_found("Teacher not found"))?;

        if teacher.is_supervisor == is_supervisor {
            return Ok(teacher);
        }
        let teacher = store
            .set_teacher_supervisor(teacher_id, is_supervisor)
            .await?
            .ok_or_else(|| AppError::not_found("Teacher not found"))?;
        tracing::info!(%teacher_id, %school_id, is_supervisor, "teacher supervisor flag changed");
        Ok(teacher)
    }
}
