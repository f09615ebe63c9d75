use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::{
        invitation::{
            AcceptInvitation, AcceptedInvitation, Invitation, InvitationKind, InvitationStatus,
            InvitationVerification, InviteMethod, IssuedInvitation, NewInvitation,
        },
        user::UserType,
    },
    services::{
        codes::{draw_unique_code, invitation_token, student_code},
        metrics::{INVITATIONS_ACCEPTED, INVITATIONS_ISSUED},
        notifications::NotificationService,
        profiles::ProfileService,
        roles::Caller,
        validation::{name_from_email, required_text, MAX_NAME_LEN},
    },
};

pub const INVITATION_TTL_DAYS: i64 = 7;

/// Rejects invitations that can no longer be accepted.
fn ensure_usable(invitation: &Invitation, now: DateTime<Utc>) -> AppResult<()> {
    if invitation.status == InvitationStatus::Accepted {
        return Err(AppError::AlreadyAccepted);
    }
    if invitation.is_expired(now) {
        return Err(AppError::Expired("Invitation".into()));
    }
    Ok(())
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = required_text("Email", email, MAX_NAME_LEN)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::bad_request("A valid email address is required")),
    }
}

pub struct InvitationService;

impl InvitationService {
    #[allow(clippy::too_many_arguments)]
    async fn issue(
        store: &dyn Store,
        clock: &Clock,
        notifier: &NotificationService,
        caller: &Caller,
        school_id: Uuid,
        kind: InvitationKind,
        email: Option<String>,
        code: Option<String>,
    ) -> AppResult<IssuedInvitation> {
        let school = store
            .get_school(school_id)
            .await?
            .ok_or_else(|| AppError::not_found("School not found"))?;

        let token = invitation_token();
        let invitation = store
            .create_invitation(NewInvitation {
                school_id,
                kind,
                email,
                code,
                invitation_token: token.clone(),
                invited_by: caller.user_id,
                expires_at: clock.now() + Duration::days(INVITATION_TTL_DAYS),
            })
            .await?;

        let method = if invitation.code.is_some() { "code" } else { "email" };
        INVITATIONS_ISSUED.with_label_values(&[kind.to_string().as_str(), method]).inc();
        tracing::info!(%school_id, invitation_id = %invitation.id, %kind, method, "invitation issued");

        let invite_url = notifier.invite_url(&token);
        if let Some(to) = invitation.email.as_deref() {
            notifier.send_invitation(to, &invite_url, &school.name, kind);
        }

        Ok(IssuedInvitation { invitation, invitation_token: token, invite_url })
    }

    pub async fn invite_teacher(
        store: &dyn Store,
        clock: &Clock,
        notifier: &NotificationService,
        caller: &Caller,
        school_id: Uuid,
        email: &str,
    ) -> AppResult<IssuedInvitation> {
        if !caller.can_supervise(school_id) {
            return Err(AppError::forbidden("Only administrators and supervisors can invite teachers"));
        }
        let email = normalize_email(email)?;
        Self::issue(store, clock, notifier, caller, school_id, InvitationKind::Teacher, Some(email), None).await
    }

    /// Email invitations are bound to one address; code invitations produce an
    /// eight-character code that anyone holding it can redeem.
    pub async fn invite_student(
        store: &dyn Store,
        clock: &Clock,
        notifier: &NotificationService,
        caller: &Caller,
        school_id: Uuid,
        method: InviteMethod,
        email: Option<&str>,
    ) -> AppResult<IssuedInvitation> {
        if !caller.can_manage_students(school_id) {
            return Err(AppError::forbidden("Only administrators and teachers can invite students"));
        }
        let (email, code) = match method {
            InviteMethod::Email => {
                let email = email.ok_or_else(|| AppError::bad_request("Email is required for email invitations"))?;
                (Some(normalize_email(email)?), None)
            }
            InviteMethod::Code => (None, Some(draw_unique_code(store, student_code).await?)),
        };
        Self::issue(store, clock, notifier, caller, school_id, InvitationKind::Student, email, code).await
    }

    /// Read-only check of an invitation token or shareable code.
    pub async fn verify(store: &dyn Store, clock: &Clock, token: &str) -> AppResult<InvitationVerification> {
        let invitation = store
            .find_invitation(token.trim())
            .await?
            .ok_or_else(|| AppError::not_found("Invitation not found"))?;
        ensure_usable(&invitation, clock.now())?;

        let school = store
            .get_school(invitation.school_id)
            .await?
            .ok_or_else(|| AppError::not_found("School not found"))?;

        Ok(InvitationVerification {
            valid: true,
            school_id: school.id,
            school_name: school.name,
            email: invitation.email,
            kind: invitation.kind,
            expires_at: invitation.expires_at,
        })
    }

    pub async fn accept(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        token: &str,
        full_name: Option<&str>,
    ) -> AppResult<AcceptedInvitation> {
        let invitation = store
            .find_invitation(token.trim())
            .await?
            .ok_or_else(|| AppError::not_found("Invitation not found"))?;
        let now = clock.now();
        ensure_usable(&invitation, now)?;

        if let Some(bound) = invitation.email.as_deref() {
            if bound.to_lowercase() != caller.email.trim().to_lowercase() {
                return Err(AppError::EmailMismatch);
            }
        }

        // A profile holds exactly one role: admins and members of other schools
        // are turned away, and a member may only renew the role they already have.
        if let Some(role) = caller.role {
            if role.user_type == UserType::SchoolAdmin || role.school_id != invitation.school_id {
                return Err(AppError::bad_request("Account already belongs to a school"));
            }
            if role.user_type != invitation.kind.user_type() {
                return Err(AppError::bad_request(format!(
                    "Account is already registered as a {} at this school",
                    role.user_type
                )));
            }
        }

        let email = ProfileService::token_email(caller)?;
        let full_name = match full_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => required_text("Full name", name, MAX_NAME_LEN)?,
            None => match store.get_profile(caller.user_id).await? {
                Some(profile) => profile.full_name,
                None => name_from_email(&email),
            },
        };

        store
            .accept_invitation(AcceptInvitation {
                invitation_id: invitation.id,
                school_id: invitation.school_id,
                kind: invitation.kind,
                user_id: caller.user_id,
                full_name,
                email,
                accepted_at: now,
            })
            .await?;

        INVITATIONS_ACCEPTED.with_label_values(&[invitation.kind.to_string().as_str()]).inc();
        tracing::info!(
            invitation_id = %invitation.id,
            school_id = %invitation.school_id,
            user_id = %caller.user_id,
            kind = %invitation.kind,
            "invitation accepted"
        );

        Ok(AcceptedInvitation { school_id: invitation.school_id, role: invitation.kind.user_type() })
    }

    pub async fn list(
        store: &dyn Store,
        caller: &Caller,
        school_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> AppResult<Vec<Invitation>> {
        if !caller.can_manage_students(school_id) {
            return Err(AppError::forbidden("Only staff can list invitations"));
        }
        store.list_invitations(school_id, status).await
    }

    /// Withdraws an invitation that has not been accepted or expired yet.
    pub async fn cancel(store: &dyn Store, caller: &Caller, id: Uuid) -> AppResult<()> {
        let invitation = store
            .get_invitation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invitation not found"))?;

        let allowed = match invitation.kind {
            InvitationKind::Teacher => caller.can_supervise(invitation.school_id),
            InvitationKind::Student => caller.can_manage_students(invitation.school_id),
        };
        if !allowed {
            return Err(AppError::forbidden("Not allowed to cancel this invitation"));
        }

        if !store.delete_pending_invitation(id).await? {
            return Err(AppError::not_found("Invitation is no longer pending"));
        }
        tracing::info!(invitation_id = %id, "invitation cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::auth::AuthenticatedUser;
    use crate::models::user::StudentStatus;
    use crate::services::roles::RoleService;
    use crate::services::schools::SchoolService;

    struct Fixture {
        store: MemoryStore,
        clock: Clock,
        notifier: NotificationService,
        school_id: Uuid,
        admin_id: Uuid,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let clock = Clock::system();
            let admin_id = Uuid::new_v4();
            let admin = RoleService::caller(&store, &AuthenticatedUser { user_id: admin_id, email: "ada@lincoln.edu".into() })
                .await
                .unwrap();
            let registered = SchoolService::register(&store, &clock, &admin, "Lincoln High", "Ada Admin")
                .await
                .unwrap();
            Self {
                store,
                clock,
                notifier: NotificationService::new(None, "http://localhost:3000"),
                school_id: registered.school.id,
                admin_id,
            }
        }

        async fn caller(&self, user_id: Uuid, email: &str) -> Caller {
            RoleService::caller(&self.store, &AuthenticatedUser { user_id, email: email.into() })
                .await
                .unwrap()
        }

        async fn admin(&self) -> Caller {
            self.caller(self.admin_id, "ada@lincoln.edu").await
        }
    }

    #[tokio::test]
    async fn test_teacher_invitation_flow() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let issued = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &admin, f.school_id, "Jane@School.edu")
            .await
            .unwrap();
        assert_eq!(issued.invitation_token.len(), 48);
        assert!(issued.invite_url.ends_with(&issued.invitation_token));

        let verified = InvitationService::verify(&f.store, &f.clock, &issued.invitation_token).await.unwrap();
        assert!(verified.valid);
        assert_eq!(verified.school_name, "Lincoln High");
        assert_eq!(verified.kind, InvitationKind::Teacher);

        let jane = f.caller(Uuid::new_v4(), "jane@school.edu").await;
        let accepted = InvitationService::accept(&f.store, &f.clock, &jane, &issued.invitation_token, Some("Jane Doe"))
            .await
            .unwrap();
        assert_eq!(accepted, AcceptedInvitation { school_id: f.school_id, role: UserType::Teacher });

        let role = RoleService::resolve(&f.store, jane.user_id).await.unwrap().unwrap();
        assert_eq!(role.user_type, UserType::Teacher);
        assert_eq!(role.school_id, f.school_id);
    }

    #[tokio::test]
    async fn test_double_accept_is_rejected_and_creates_one_row() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let issued = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap();
        let code = issued.invitation.code.clone().unwrap();
        assert_eq!(code.len(), 8);

        let sam = f.caller(Uuid::new_v4(), "sam@lincoln.edu").await;
        InvitationService::accept(&f.store, &f.clock, &sam, &code, Some("Sam")).await.unwrap();

        let sam = f.caller(sam.user_id, "sam@lincoln.edu").await;
        let err = InvitationService::accept(&f.store, &f.clock, &sam, &code, Some("Sam")).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyAccepted));

        let students = f.store.list_students(f.school_id, None).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].status, Some(StudentStatus::Active));
    }

    #[tokio::test]
    async fn test_accept_after_expiry_writes_nothing() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let issued = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &admin, f.school_id, "jane@school.edu")
            .await
            .unwrap();

        f.clock.advance(Duration::days(8));
        let err = InvitationService::verify(&f.store, &f.clock, &issued.invitation_token).await.unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));

        let jane = f.caller(Uuid::new_v4(), "jane@school.edu").await;
        let err = InvitationService::accept(&f.store, &f.clock, &jane, &issued.invitation_token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));

        assert!(f.store.get_teacher(jane.user_id).await.unwrap().is_none());
        assert!(RoleService::resolve(&f.store, jane.user_id).await.unwrap().is_none());
        let invitation = f.store.get_invitation(issued.invitation.id).await.unwrap().unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn test_email_mismatch() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let issued = InvitationService::invite_student(
            &f.store,
            &f.clock,
            &f.notifier,
            &admin,
            f.school_id,
            InviteMethod::Email,
            Some("kid@lincoln.edu"),
        )
        .await
        .unwrap();

        let other = f.caller(Uuid::new_v4(), "someone@else.org").await;
        let err = InvitationService::accept(&f.store, &f.clock, &other, &issued.invitation_token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailMismatch));
    }

    #[tokio::test]
    async fn test_permissions_and_validation() {
        let f = Fixture::new().await;
        let admin = f.admin().await;

        let teacher_invite = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &admin, f.school_id, "t@lincoln.edu")
            .await
            .unwrap();
        let teacher = f.caller(Uuid::new_v4(), "t@lincoln.edu").await;
        InvitationService::accept(&f.store, &f.clock, &teacher, &teacher_invite.invitation_token, Some("Tom"))
            .await
            .unwrap();
        let teacher = f.caller(teacher.user_id, "t@lincoln.edu").await;

        // Plain teachers may invite students but not teachers.
        let err = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &teacher, f.school_id, "x@lincoln.edu")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &teacher, f.school_id, InviteMethod::Code, None)
            .await
            .is_ok());

        let err = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Email, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let nobody = f.caller(Uuid::new_v4(), "nobody@x.org").await;
        let err = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &nobody, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = InvitationService::verify(&f.store, &f.clock, "does-not-exist").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_and_cancel() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let first = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap();
        let second = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap();

        let sam = f.caller(Uuid::new_v4(), "sam@lincoln.edu").await;
        InvitationService::accept(&f.store, &f.clock, &sam, &second.invitation_token, None).await.unwrap();

        let pending = InvitationService::list(&f.store, &admin, f.school_id, Some(InvitationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.invitation.id);

        let err = InvitationService::cancel(&f.store, &admin, second.invitation.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        InvitationService::cancel(&f.store, &admin, first.invitation.id).await.unwrap();
        assert!(InvitationService::list(&f.store, &admin, f.school_id, None).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_member_cannot_accept_invitation_for_other_role() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let school_code = f.store.get_school(f.school_id).await.unwrap().unwrap().code.unwrap();

        let sam = f.caller(Uuid::new_v4(), "sam@lincoln.edu").await;
        SchoolService::join_with_code(&f.store, &f.clock, &sam, &school_code, "Sam Student").await.unwrap();
        let sam = f.caller(sam.user_id, "sam@lincoln.edu").await;

        let teacher_invite = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &admin, f.school_id, "sam@lincoln.edu")
            .await
            .unwrap();
        let err = InvitationService::accept(&f.store, &f.clock, &sam, &teacher_invite.invitation_token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(f.store.get_teacher(sam.user_id).await.unwrap().is_none());
        assert!(f.store.list_teachers(f.school_id).await.unwrap().is_empty());
        let invitation = f.store.get_invitation(teacher_invite.invitation.id).await.unwrap().unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);

        let tom_invite = InvitationService::invite_teacher(&f.store, &f.clock, &f.notifier, &admin, f.school_id, "tom@lincoln.edu")
            .await
            .unwrap();
        let tom = f.caller(Uuid::new_v4(), "tom@lincoln.edu").await;
        InvitationService::accept(&f.store, &f.clock, &tom, &tom_invite.invitation_token, Some("Tom")).await.unwrap();
        let tom = f.caller(tom.user_id, "tom@lincoln.edu").await;

        let student_code = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap()
            .invitation
            .code
            .unwrap();
        let err = InvitationService::accept(&f.store, &f.clock, &tom, &student_code, None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(f.store.get_student(tom.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_student_code_is_case_insensitive() {
        let f = Fixture::new().await;
        let admin = f.admin().await;
        let issued = InvitationService::invite_student(&f.store, &f.clock, &f.notifier, &admin, f.school_id, InviteMethod::Code, None)
            .await
            .unwrap();
        let typed = format!("  {}  ", issued.invitation.code.clone().unwrap().to_lowercase());

        let verified = InvitationService::verify(&f.store, &f.clock, &typed).await.unwrap();
        assert_eq!(verified.kind, InvitationKind::Student);

        let sam = f.caller(Uuid::new_v4(), "sam@lincoln.edu").await;
        let accepted = InvitationService::accept(&f.store, &f.clock, &sam, &typed, Some("Sam")).await.unwrap();
        assert_eq!(accepted.role, UserType::Student);

        // Tokens stay case-sensitive.
        let token = issued.invitation_token.to_lowercase();
        if token != issued.invitation_token {
            let err = InvitationService::verify(&f.store, &f.clock, &token).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }
}
