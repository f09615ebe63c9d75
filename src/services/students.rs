use uuid::Uuid;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::user::{MemberSummary, Student, StudentStatus},
    services::{metrics::STUDENTS_APPROVED, roles::Caller},
};

pub struct StudentService;

impl StudentService {
    async fn managed_student(store: &dyn Store, caller: &Caller, student_id: Uuid) -> AppResult<Student> {
        let student = store
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student not found"))?;
        if !caller.can_manage_students(student.school_id) {
            return Err(AppError::forbidden("Only staff of the student's school can manage students"));
        }
        Ok(student)
    }

    /// Moves a pending student to active. Approving an active student
    /// returns it unchanged.
    pub async fn approve(store: &dyn Store, caller: &Caller, student_id: Uuid) -> AppResult<Student> {
        let student = Self::managed_student(store, caller, student_id).await?;
        if student.status == StudentStatus::Active {
            return Ok(student);
        }

        let student = store
            .activate_student(student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student not found"))?;
        STUDENTS_APPROVED.with_label_values(&["approval"]).inc();
        tracing::info!(%student_id, school_id = %student.school_id, approved_by = %caller.user_id, "student approved");
        Ok(student)
    }

    /// Removes the student from the school and clears the profile's role.
    pub async fn revoke(store: &dyn Store, caller: &Caller, student_id: Uuid) -> AppResult<()> {
        let student = Self::managed_student(store, caller, student_id).await?;
        if !store.revoke_student(student_id).await? {
            return Err(AppError::not_found("Student not found"));
        }
        tracing::info!(%student_id, school_id = %student.school_id, revoked_by = %caller.user_id, "student access revoked");
        Ok(())
    }

    pub async fn list(
        store: &dyn Store,
        caller: &Caller,
        school_id: Uuid,
        status: Option<StudentStatus>,
    ) -> AppResult<Vec<MemberSummary>> {
        if !caller.can_manage_students(school_id) {
            return Err(AppError::forbidden("Only staff can list students"));
        }
        store.list_students(school_id, status).await
    }
}
