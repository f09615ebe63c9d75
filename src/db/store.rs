use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        chat::{ChatMessage, Conversation, MessageRole},
        document::{Document, NewDocument},
        invitation::{AcceptInvitation, Invitation, InvitationStatus, NewInvitation},
        school::{CodeUpdateOutcome, JoinSchool, NewSchool, School, SchoolCodeUpdate},
        session_log::{SessionLog, UsageSummary},
        user::{MemberSummary, Profile, Student, StudentStatus, Teacher},
    },
};

/// Persistence boundary for every handler.
///
/// Methods that touch several tables (`create_school`, `store_school_code`,
/// `join_school`, `accept_invitation`, `revoke_student`) must apply all of
/// their writes or none of them.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn ping(&self) -> AppResult<()>;

    // Schools
    /// Creates the school, the administrator's profile and admin-role row, and
    /// the first school code (logged as a generation).
    async fn create_school(&self, school: NewSchool) -> AppResult<School>;
    async fn get_school(&self, id: Uuid) -> AppResult<Option<School>>;
    async fn find_school_by_code(&self, code: &str) -> AppResult<Option<School>>;
    /// True when the code is held by any school or shareable invitation.
    async fn code_taken(&self, code: &str) -> AppResult<bool>;
    /// Replaces the school's code and logs the generation, unless the
    /// generation window is already full or the code was claimed concurrently.
    async fn store_school_code(&self, update: SchoolCodeUpdate) -> AppResult<CodeUpdateOutcome>;
    async fn count_code_generations(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<i64>;

    // Profiles & roles
    async fn upsert_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile>;
    /// Creates a bare profile when none exists and leaves an existing one alone.
    async fn ensure_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile>;
    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>>;
    async fn admin_school(&self, user_id: Uuid) -> AppResult<Option<Uuid>>;
    async fn get_teacher(&self, id: Uuid) -> AppResult<Option<Teacher>>;
    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>>;

    // Teachers
    async fn list_teachers(&self, school_id: Uuid) -> AppResult<Vec<MemberSummary>>;
    async fn set_teacher_supervisor(&self, id: Uuid, is_supervisor: bool) -> AppResult<Option<Teacher>>;

    // Students
    /// Inserts a pending student (keeping an existing row unchanged) and points
    /// the profile at the school.
    async fn join_school(&self, join: JoinSchool) -> AppResult<Student>;
    /// Sets the student active. Returns `None` for an unknown student.
    async fn activate_student(&self, id: Uuid) -> AppResult<Option<Student>>;
    /// Deletes the student row and clears the profile's role. Returns `false`
    /// for an unknown student.
    async fn revoke_student(&self, id: Uuid) -> AppResult<bool>;
    async fn list_students(
        &self,
        school_id: Uuid,
        status: Option<StudentStatus>,
    ) -> AppResult<Vec<MemberSummary>>;

    // Invitations
    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation>;
    /// Looks an invitation up by its exact token, or by its shareable code in
    /// any letter case.
    async fn find_invitation(&self, token_or_code: &str) -> AppResult<Option<Invitation>>;
    async fn get_invitation(&self, id: Uuid) -> AppResult<Option<Invitation>>;
    /// Claims a pending invitation, upserts the teacher or student row and
    /// updates the profile. Fails with `AlreadyAccepted` when the invitation
    /// is no longer pending.
    async fn accept_invitation(&self, accept: AcceptInvitation) -> AppResult<()>;
    async fn list_invitations(
        &self,
        school_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> AppResult<Vec<Invitation>>;
    /// Deletes a still-pending invitation.
    async fn delete_pending_invitation(&self, id: Uuid) -> AppResult<bool>;
    /// Marks every pending invitation past its expiry as expired.
    async fn expire_invitations(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // Chat
    async fn create_conversation(
        &self,
        owner_id: Uuid,
        school_id: Option<Uuid>,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Conversation>;
    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>>;
    async fn list_conversations(&self, owner_id: Uuid) -> AppResult<Vec<Conversation>>;
    async fn add_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ChatMessage>;
    async fn list_messages(&self, conversation_id: Uuid) -> AppResult<Vec<ChatMessage>>;

    // Documents
    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> AppResult<Document>;
    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>>;
    async fn list_documents(&self, uploader_id: Uuid, school_id: Option<Uuid>) -> AppResult<Vec<Document>>;
    async fn delete_document(&self, id: Uuid) -> AppResult<bool>;

    // Session logs
    async fn start_session(
        &self,
        user_id: Uuid,
        school_id: Option<Uuid>,
        activity: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SessionLog>;
    async fn get_session(&self, id: Uuid) -> AppResult<Option<SessionLog>>;
    /// Sets `ended_at` if it is still empty and returns the row.
    async fn end_session(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<SessionLog>>;
    async fn usage_summary(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<UsageSummary>;
}
