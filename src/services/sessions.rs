use chrono::Duration;
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::session_log::{SessionLog, UsageSummary},
    services::{
        profiles::ProfileService,
        roles::Caller,
        validation::{required_text, MAX_ACTIVITY_LEN},
    },
};

pub const DEFAULT_USAGE_DAYS: i64 = 30;
pub const MAX_USAGE_DAYS: i64 = 365;

pub struct SessionService;

impl SessionService {
    pub async fn start(store: &dyn Store, clock: &Clock, caller: &Caller, activity: &str) -> AppResult<SessionLog> {
        let activity = required_text("Activity", activity, MAX_ACTIVITY_LEN)?;
        ProfileService::ensure(store, caller).await?;
        store
            .start_session(caller.user_id, caller.school_id(), &activity, clock.now())
            .await
    }

    /// Ends the caller's session. Ending it again keeps the first end time.
    pub async fn end(store: &dyn Store, clock: &Clock, caller: &Caller, id: Uuid) -> AppResult<SessionLog> {
        store
            .get_session(id)
            .await?
            .filter(|s| s.user_id == caller.user_id)
            .ok_or_else(|| AppError::not_found("Session not found"))?;
        store
            .end_session(id, clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Session not found"))
    }

    pub async fn usage_summary(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        school_id: Uuid,
        days: Option<i64>,
    ) -> AppResult<UsageSummary> {
        if !caller.can_manage_students(school_id) {
            return Err(AppError::forbidden("Only staff can view usage"));
        }
        let days = days.unwrap_or(DEFAULT_USAGE_DAYS);
        if !(1..=MAX_USAGE_DAYS).contains(&days) {
            return Err(AppError::bad_request(format!("days must be between 1 and {MAX_USAGE_DAYS}")));
        }
        store.usage_summary(school_id, clock.now() - Duration::days(days)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::user::UserType;
    use crate::services::roles::ResolvedRole;

    fn member(school_id: Uuid, user_type: UserType) -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            email: "someone@lincoln.edu".into(),
            role: Some(ResolvedRole { user_type, school_id, is_supervisor: false, student_status: None }),
        }
    }

    #[tokio::test]
    async fn test_usage_summary_counts_completed_minutes() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let school = Uuid::new_v4();
        let sam = member(school, UserType::Student);
        let kim = member(school, UserType::Student);
        let teacher = member(school, UserType::Teacher);

        let first = SessionService::start(&store, &clock, &sam, "chat").await.unwrap();
        let second = SessionService::start(&store, &clock, &sam, "reading").await.unwrap();
        SessionService::start(&store, &clock, &kim, "chat").await.unwrap();

        clock.advance(Duration::minutes(25));
        SessionService::end(&store, &clock, &sam, first.id).await.unwrap();
        clock.advance(Duration::minutes(5));
        SessionService::end(&store, &clock, &sam, second.id).await.unwrap();

        let summary = SessionService::usage_summary(&store, &clock, &teacher, school, Some(7)).await.unwrap();
        assert_eq!(summary.sessions, 3);
        assert_eq!(summary.active_users, 2);
        assert_eq!(summary.total_minutes, 55);
    }

    #[tokio::test]
    async fn test_end_is_owner_only_and_idempotent() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let school = Uuid::new_v4();
        let sam = member(school, UserType::Student);
        let kim = member(school, UserType::Student);

        let session = SessionService::start(&store, &clock, &sam, "chat").await.unwrap();
        let err = SessionService::end(&store, &clock, &kim, session.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let ended = SessionService::end(&store, &clock, &sam, session.id).await.unwrap();
        clock.advance(Duration::minutes(10));
        let again = SessionService::end(&store, &clock, &sam, session.id).await.unwrap();
        assert_eq!(ended.ended_at, again.ended_at);

        let err = SessionService::usage_summary(&store, &clock, &sam, school, None).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let teacher = member(school, UserType::Teacher);
        let err = SessionService::usage_summary(&store, &clock, &teacher, school, Some(0)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_start_creates_missing_profile_and_bounds_activity() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let sam = member(Uuid::new_v4(), UserType::Student);
        assert!(store.get_profile(sam.user_id).await.unwrap().is_none());

        SessionService::start(&store, &clock, &sam, "chat").await.unwrap();
        let profile = store.get_profile(sam.user_id).await.unwrap().unwrap();
        assert_eq!(profile.full_name, "someone");

        let err = SessionService::start(&store, &clock, &sam, &"a".repeat(65)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
