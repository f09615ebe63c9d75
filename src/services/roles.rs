use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Store,
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        user::{StudentStatus, UserType},
    },
};

/// The role an identity holds, scoped to exactly one school.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ResolvedRole {
    pub user_type: UserType,
    pub school_id: Uuid,
    pub is_supervisor: bool,
    pub student_status: Option<StudentStatus>,
}

/// Per-request session: the verified identity plus its resolved role.
#[derive(Debug, Clone, Serialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: String,
    pub role: Option<ResolvedRole>,
}

impl Caller {
    pub fn school_id(&self) -> Option<Uuid> {
        self.role.map(|r| r.school_id)
    }

    fn has(&self, school_id: Uuid, user_type: UserType) -> bool {
        self.role
            .is_some_and(|r| r.school_id == school_id && r.user_type == user_type)
    }

    pub fn is_admin_of(&self, school_id: Uuid) -> bool {
        self.has(school_id, UserType::SchoolAdmin)
    }

    /// Admins, and teachers flagged as supervisors.
    pub fn can_supervise(&self, school_id: Uuid) -> bool {
        self.is_admin_of(school_id)
            || self
                .role
                .is_some_and(|r| r.school_id == school_id && r.user_type == UserType::Teacher && r.is_supervisor)
    }

    /// Admins and any teacher of the school.
    pub fn can_manage_students(&self, school_id: Uuid) -> bool {
        self.is_admin_of(school_id) || self.has(school_id, UserType::Teacher)
    }

    pub fn is_member_of(&self, school_id: Uuid) -> bool {
        self.school_id() == Some(school_id)
    }
}

pub struct RoleService;

impl RoleService {
    /// Resolves the caller's role. The first match wins:
    /// admin table, profile type, teacher membership, student membership.
    /// An identity matching none of them has no role.
    pub async fn resolve(store: &dyn Store, user_id: Uuid) -> AppResult<Option<ResolvedRole>> {
        if let Some(school_id) = store.admin_school(user_id).await? {
            return Ok(Some(ResolvedRole {
                user_type: UserType::SchoolAdmin,
                school_id,
                is_supervisor: false,
                student_status: None,
            }));
        }

        let teacher = store.get_teacher(user_id).await?;
        let student = store.get_student(user_id).await?;

        if let Some(profile) = store.get_profile(user_id).await? {
            if let (Some(user_type), Some(school_id)) = (profile.user_type, profile.school_id) {
                return Ok(Some(ResolvedRole {
                    user_type,
                    school_id,
                    is_supervisor: user_type == UserType::Teacher
                        && teacher.as_ref().is_some_and(|t| t.school_id == school_id && t.is_supervisor),
                    student_status: match user_type {
                        UserType::Student => student
                            .as_ref()
                            .filter(|s| s.school_id == school_id)
                            .map(|s| s.status),
                        _ => None,
                    },
                }));
            }
        }

        if let Some(t) = teacher {
            return Ok(Some(ResolvedRole {
                user_type: UserType::Teacher,
                school_id: t.school_id,
                is_supervisor: t.is_supervisor,
                student_status: None,
            }));
        }

        Ok(student.map(|s| ResolvedRole {
            user_type: UserType::Student,
            school_id: s.school_id,
            is_supervisor: false,
            student_status: Some(s.status),
        }))
    }

    pub async fn caller(store: &dyn Store, user: &AuthenticatedUser) -> AppResult<Caller> {
        Ok(Caller {
            user_id: user.user_id,
            email: user.email.clone(),
            role: Self::resolve(store, user.user_id).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::school::{JoinSchool, NewSchool};

    fn caller(role: Option<ResolvedRole>) -> Caller {
        Caller { user_id: Uuid::new_v4(), email: "x@school.edu".into(), role }
    }

    fn role(user_type: UserType, school_id: Uuid, is_supervisor: bool) -> Option<ResolvedRole> {
        Some(ResolvedRole { user_type, school_id, is_supervisor, student_status: None })
    }

    #[test]
    fn test_capabilities() {
        let school = Uuid::new_v4();
        let other = Uuid::new_v4();

        let admin = caller(role(UserType::SchoolAdmin, school, false));
        assert!(admin.is_admin_of(school) && admin.can_supervise(school) && admin.can_manage_students(school));
        assert!(!admin.is_admin_of(other));

        let supervisor = caller(role(UserType::Teacher, school, true));
        assert!(supervisor.can_supervise(school));
        assert!(!supervisor.is_admin_of(school));

        let teacher = caller(role(UserType::Teacher, school, false));
        assert!(!teacher.can_supervise(school));
        assert!(teacher.can_manage_students(school));
        assert!(!teacher.can_manage_students(other));

        let student = caller(role(UserType::Student, school, false));
        assert!(!student.can_manage_students(school));
        assert!(student.is_member_of(school));
    }

    #[test]
    fn test_no_role_denies_everything() {
        let nobody = caller(None);
        let school = Uuid::new_v4();
        assert!(!nobody.is_admin_of(school));
        assert!(!nobody.can_supervise(school));
        assert!(!nobody.can_manage_students(school));
        assert!(!nobody.is_member_of(school));
    }

    #[tokio::test]
    async fn test_resolution_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let admin = Uuid::new_v4();
        let school = store
            .create_school(NewSchool {
                name: "Lincoln High".into(),
                admin_id: admin,
                admin_full_name: "Ada".into(),
                admin_email: "ada@lincoln.edu".into(),
                code: "SCHABCDEF".into(),
                code_expires_at: now + Duration::hours(24),
                created_at: now,
            })
            .await
            .unwrap();

        let resolved = RoleService::resolve(&store, admin).await.unwrap().unwrap();
        assert_eq!(resolved.user_type, UserType::SchoolAdmin);
        assert_eq!(resolved.school_id, school.id);

        let student = Uuid::new_v4();
        store
            .join_school(JoinSchool {
                school_id: school.id,
                student_id: student,
                full_name: "Sam".into(),
                email: "sam@lincoln.edu".into(),
                joined_at: now,
            })
            .await
            .unwrap();
        let resolved = RoleService::resolve(&store, student).await.unwrap().unwrap();
        assert_eq!(resolved.user_type, UserType::Student);
        assert_eq!(resolved.student_status, Some(StudentStatus::Pending));

        let stranger = Uuid::new_v4();
        store.upsert_profile(stranger, "Stranger", "s@x.org").await.unwrap();
        assert!(RoleService::resolve(&store, stranger).await.unwrap().is_none());
    }
}
