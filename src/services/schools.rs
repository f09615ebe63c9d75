use chrono::Duration;
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::{
        school::{JoinSchool, NewSchool, RegisteredSchool, School, SchoolCodeResponse},
        user::{Student, UserType},
    },
    services::{
        codes::{draw_unique_code, school_code, SCHOOL_CODE_TTL_HOURS},
        metrics::SCHOOL_CODES_GENERATED,
        profiles::ProfileService,
        roles::Caller,
        validation::{required_text, MAX_NAME_LEN},
    },
};

pub struct SchoolService;

impl SchoolService {
    /// Creates a school with the caller as its administrator and issues the
    /// first join code.
    pub async fn register(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        name: &str,
        full_name: &str,
    ) -> AppResult<RegisteredSchool> {
        let name = required_text("School name", name, MAX_NAME_LEN)?;
        let full_name = required_text("Full name", full_name, MAX_NAME_LEN)?;
        let email = ProfileService::token_email(caller)?;
        if caller.role.is_some() {
            return Err(AppError::bad_request("Account already belongs to a school"));
        }

        let code = draw_unique_code(store, school_code).await?;
        let now = clock.now();
        let expires_at = now + Duration::hours(SCHOOL_CODE_TTL_HOURS);

        let school = store
            .create_school(NewSchool {
                name,
                admin_id: caller.user_id,
                admin_full_name: full_name,
                admin_email: email,
                code: code.clone(),
                code_expires_at: expires_at,
                created_at: now,
            })
            .await?;

        SCHOOL_CODES_GENERATED.with_label_values(&["register"]).inc();
        tracing::info!(school_id = %school.id, admin_id = %caller.user_id, "school registered");

        Ok(RegisteredSchool { school, code: SchoolCodeResponse { code, expires_at } })
    }

    /// Student self-service signup. The student stays pending until a teacher
    /// or administrator approves them.
    pub async fn join_with_code(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        code: &str,
        full_name: &str,
    ) -> AppResult<Student> {
        let code = code.trim().to_uppercase();
        let full_name = required_text("Full name", full_name, MAX_NAME_LEN)?;
        let email = ProfileService::token_email(caller)?;

        let school = store
            .find_school_by_code(&code)
            .await?
            .ok_or_else(|| AppError::not_found("Invalid school code"))?;
        let now = clock.now();
        if !school.code_is_active(now) {
            return Err(AppError::Expired("School code".into()));
        }

        if let Some(role) = caller.role {
            if role.user_type != UserType::Student {
                return Err(AppError::bad_request("Staff accounts cannot join as students"));
            }
            if role.school_id != school.id {
                return Err(AppError::bad_request("Account already belongs to another school"));
            }
        }

        let student = store
            .join_school(JoinSchool {
                school_id: school.id,
                student_id: caller.user_id,
                full_name,
                email,
                joined_at: now,
            })
            .await?;

        tracing::info!(school_id = %school.id, student_id = %caller.user_id, "student joined with school code");
        Ok(student)
    }

    /// School details for its members. Only supervisors see the join code.
    pub async fn get(store: &dyn Store, caller: &Caller, school_id: Uuid) -> AppResult<School> {
        if !caller.is_member_of(school_id) {
            return Err(AppError::forbidden("Not a member of this school"));
        }
        let mut school = store
            .get_school(school_id)
            .await?
            .ok_or_else(|| AppError::not_found("School not found"))?;
        if !caller.can_supervise(school_id) {
            school.code = None;
            school.code_expires_at = None;
        }
        Ok(school)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::user::StudentStatus;
    use crate::services::roles::RoleService;
    use crate::models::auth::AuthenticatedUser;

    async fn caller_for(store: &MemoryStore, user_id: Uuid, email: &str) -> Caller {
        RoleService::caller(store, &AuthenticatedUser { user_id, email: email.into() })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_join() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let admin = caller_for(&store, Uuid::new_v4(), "ada@lincoln.edu").await;

        let registered = SchoolService::register(&store, &clock, &admin, "Lincoln High", "Ada Admin")
            .await
            .unwrap();
        assert!(registered.code.code.starts_with("SCH"));

        let student = caller_for(&store, Uuid::new_v4(), "sam@lincoln.edu").await;
        let joined = SchoolService::join_with_code(
            &store,
            &clock,
            &student,
            &registered.code.code.to_lowercase(),
            "Sam Student",
        )
        .await
        .unwrap();
        assert_eq!(joined.status, StudentStatus::Pending);
        assert_eq!(joined.school_id, registered.school.id);

        // Joining twice keeps the original row.
        let student = caller_for(&store, student.user_id, "sam@lincoln.edu").await;
        let again = SchoolService::join_with_code(&store, &clock, &student, &registered.code.code, "Sam")
            .await
            .unwrap();
        assert_eq!(again.created_at, joined.created_at);
    }

    #[tokio::test]
    async fn test_join_rejects_expired_and_unknown_codes() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let admin = caller_for(&store, Uuid::new_v4(), "ada@lincoln.edu").await;
        let registered = SchoolService::register(&store, &clock, &admin, "Lincoln High", "Ada")
            .await
            .unwrap();
        let student = caller_for(&store, Uuid::new_v4(), "sam@lincoln.edu").await;

        let err = SchoolService::join_with_code(&store, &clock, &student, "SCHZZZZZZ", "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        clock.advance(Duration::hours(25));
        let err = SchoolService::join_with_code(&store, &clock, &student, &registered.code.code, "Sam")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[tokio::test]
    async fn test_staff_cannot_join_as_student() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let admin = caller_for(&store, Uuid::new_v4(), "ada@lincoln.edu").await;
        let registered = SchoolService::register(&store, &clock, &admin, "Lincoln High", "Ada")
            .await
            .unwrap();

        let admin = caller_for(&store, admin.user_id, "ada@lincoln.edu").await;
        let err = SchoolService::join_with_code(&store, &clock, &admin, &registered.code.code, "Ada")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = SchoolService::register(&store, &clock, &admin, "Second School", "Ada")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_students_do_not_see_the_code() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let admin = caller_for(&store, Uuid::new_v4(), "ada@lincoln.edu").await;
        let registered = SchoolService::register(&store, &clock, &admin, "Lincoln High", "Ada")
            .await
            .unwrap();
        let school_id = registered.school.id;

        let student = caller_for(&store, Uuid::new_v4(), "sam@lincoln.edu").await;
        SchoolService::join_with_code(&store, &clock, &student, &registered.code.code, "Sam")
            .await
            .unwrap();
        let student = caller_for(&store, student.user_id, "sam@lincoln.edu").await;

        let seen = SchoolService::get(&store, &student, school_id).await.unwrap();
        assert!(seen.code.is_none());

        let admin = caller_for(&store, admin.user_id, "ada@lincoln.edu").await;
        let seen = SchoolService::get(&store, &admin, school_id).await.unwrap();
        assert_eq!(seen.code, Some(registered.code.code));

        let outsider = caller_for(&store, Uuid::new_v4(), "out@x.org").await;
        assert!(SchoolService::get(&store, &outsider, school_id).await.is_err());
    }
}
