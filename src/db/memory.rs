use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::store::Store,
    error::{AppError, AppResult},
    models::{
        chat::{ChatMessage, Conversation, MessageRole},
        document::{Document, NewDocument},
        invitation::{AcceptInvitation, Invitation, InvitationKind, InvitationStatus, NewInvitation},
        school::{CodeUpdateOutcome, JoinSchool, NewSchool, School, SchoolCodeUpdate},
        session_log::{SessionLog, UsageSummary},
        user::{MemberSummary, Profile, Student, StudentStatus, Teacher, UserType},
    },
};

struct CodeGeneration {
    school_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    schools: HashMap<Uuid, School>,
    profiles: HashMap<Uuid, Profile>,
    school_admins: Vec<(Uuid, Uuid)>,
    teachers: HashMap<Uuid, Teacher>,
    students: HashMap<Uuid, Student>,
    invitations: HashMap<Uuid, Invitation>,
    code_generations: Vec<CodeGeneration>,
    conversations: HashMap<Uuid, Conversation>,
    messages: Vec<ChatMessage>,
    documents: HashMap<Uuid, Document>,
    sessions: HashMap<Uuid, SessionLog>,
}

impl Tables {
    fn set_profile_role(&mut self, id: Uuid, full_name: &str, email: &str, role: UserType, school_id: Uuid, now: DateTime<Utc>) {
        let profile = self.profiles.entry(id).or_insert_with(|| Profile {
            id,
            full_name: full_name.to_string(),
            email: email.to_string(),
            user_type: None,
            school_id: None,
            created_at: now,
            updated_at: now,
        });
        profile.full_name = full_name.to_string();
        profile.email = email.to_string();
        profile.user_type = Some(role);
        profile.school_id = Some(school_id);
        profile.updated_at = now;
    }

    /// Rows owned by a user reference `profiles(id)`.
    fn require_profile(&self, id: Uuid) -> AppResult<()> {
        if self.profiles.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::Internal(format!("no profile {id} for owned row")))
        }
    }

    fn member(&self, id: Uuid, status: Option<StudentStatus>, is_supervisor: Option<bool>, created_at: DateTime<Utc>) -> Option<MemberSummary> {
        self.profiles.get(&id).map(|p| MemberSummary {
            id,
            full_name: p.full_name.clone(),
            email: p.email.clone(),
            status,
            is_supervisor,
            created_at,
        })
    }
}

/// In-process [`Store`] used by the test suite and by `STORE=memory`.
///
/// Every method runs under one mutex, so multi-table writes are as atomic as
/// their transactional Postgres counterparts.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.lock().map(|_| ())
    }

    async fn create_school(&self, school: NewSchool) -> AppResult<School> {
        let mut t = self.lock()?;
        if t.schools.values().any(|s| s.code.as_deref() == Some(school.code.as_str())) {
            return Err(AppError::Internal("school code already in use".into()));
        }

        let created = School {
            id: Uuid::new_v4(),
            name: school.name,
            code: Some(school.code),
            code_expires_at: Some(school.code_expires_at),
            created_by: school.admin_id,
            created_at: school.created_at,
        };
        t.schools.insert(created.id, created.clone());
        t.set_profile_role(
            school.admin_id,
            &school.admin_full_name,
            &school.admin_email,
            UserType::SchoolAdmin,
            created.id,
            school.created_at,
        );
        t.school_admins.push((school.admin_id, created.id));
        t.code_generations.push(CodeGeneration { school_id: created.id, created_at: school.created_at });
        Ok(created)
    }

    async fn get_school(&self, id: Uuid) -> AppResult<Option<School>> {
        Ok(self.lock()?.schools.get(&id).cloned())
    }

    async fn find_school_by_code(&self, code: &str) -> AppResult<Option<School>> {
        let t = self.lock()?;
        Ok(t.schools.values().find(|s| s.code.as_deref() == Some(code)).cloned())
    }

    async fn code_taken(&self, code: &str) -> AppResult<bool> {
        let t = self.lock()?;
        Ok(t.schools.values().any(|s| s.code.as_deref() == Some(code))
            || t.invitations.values().any(|i| i.code.as_deref() == Some(code)))
    }

    async fn store_school_code(&self, update: SchoolCodeUpdate) -> AppResult<CodeUpdateOutcome> {
        let mut t = self.lock()?;
        if !t.schools.contains_key(&update.school_id) {
            return Err(AppError::not_found("School not found"));
        }

        let recent = t
            .code_generations
            .iter()
            .filter(|g| g.school_id == update.school_id && g.created_at > update.window_start)
            .count() as i64;
        if recent >= update.max_per_window {
            return Ok(CodeUpdateOutcome::RateLimited { recent });
        }

        if t.schools.values().any(|s| s.id != update.school_id && s.code.as_deref() == Some(update.code.as_str())) {
            return Ok(CodeUpdateOutcome::Taken);
        }
        if let Some(school) = t.schools.get_mut(&update.school_id) {
            school.code = Some(update.code.clone());
            school.code_expires_at = Some(update.expires_at);
        }
        t.code_generations.push(CodeGeneration { school_id: update.school_id, created_at: update.generated_at });
        Ok(CodeUpdateOutcome::Stored)
    }

    async fn count_code_generations(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let t = self.lock()?;
        let count = t
            .code_generations
            .iter()
            .filter(|g| g.school_id == school_id && g.created_at > since)
            .count();
        Ok(count as i64)
    }

    async fn upsert_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile> {
        let mut t = self.lock()?;
        let now = Utc::now();
        let profile = t.profiles.entry(id).or_insert_with(|| Profile {
            id,
            full_name: String::new(),
            email: String::new(),
            user_type: None,
            school_id: None,
            created_at: now,
            updated_at: now,
        });
        profile.full_name = full_name.to_string();
        profile.email = email.to_string();
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn ensure_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile> {
        let mut t = self.lock()?;
        let now = Utc::now();
        let profile = t.profiles.entry(id).or_insert_with(|| Profile {
            id,
            full_name: full_name.to_string(),
            email: email.to_string(),
            user_type: None,
            school_id: None,
            created_at: now,
            updated_at: now,
        });
        Ok(profile.clone())
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.lock()?.profiles.get(&id).cloned())
    }

    async fn admin_school(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
        let t = self.lock()?;
        Ok(t.school_admins.iter().find(|(u, _)| *u == user_id).map(|(_, s)| *s))
    }

    async fn get_teacher(&self, id: Uuid) -> AppResult<Option<Teacher>> {
        Ok(self.lock()?.teachers.get(&id).cloned())
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        Ok(self.lock()?.students.get(&id).cloned())
    }

    async fn list_teachers(&self, school_id: Uuid) -> AppResult<Vec<MemberSummary>> {
        let t = self.lock()?;
        let mut members: Vec<MemberSummary> = t
            .teachers
            .values()
            .filter(|teacher| teacher.school_id == school_id)
            .filter_map(|teacher| t.member(teacher.id, None, Some(teacher.is_supervisor), teacher.created_at))
            .collect();
        members.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(members)
    }

    async fn set_teacher_supervisor(&self, id: Uuid, is_supervisor: bool) -> AppResult<Option<Teacher>> {
        let mut t = self.lock()?;
        Ok(t.teachers.get_mut(&id).map(|teacher| {
            teacher.is_supervisor = is_supervisor;
            teacher.clone()
        }))
    }

    async fn join_school(&self, join: JoinSchool) -> AppResult<Student> {
        let mut t = self.lock()?;
        t.set_profile_role(
            join.student_id,
            &join.full_name,
            &join.email,
            UserType::Student,
            join.school_id,
            join.joined_at,
        );
        let student = t.students.entry(join.student_id).or_insert_with(|| Student {
            id: join.student_id,
            school_id: join.school_id,
            status: StudentStatus::Pending,
            created_at: join.joined_at,
            updated_at: join.joined_at,
        });
        Ok(student.clone())
    }

    async fn activate_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        let mut t = self.lock()?;
        Ok(t.students.get_mut(&id).map(|student| {
            if student.status != StudentStatus::Active {
                student.status = StudentStatus::Active;
                student.updated_at = Utc::now();
            }
            student.clone()
        }))
    }

    async fn revoke_student(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.lock()?;
        if t.students.remove(&id).is_none() {
            return Ok(false);
        }
        if let Some(profile) = t.profiles.get_mut(&id) {
            if profile.user_type == Some(UserType::Student) {
                profile.user_type = None;
                profile.school_id = None;
                profile.updated_at = Utc::now();
            }
        }
        Ok(true)
    }

    async fn list_students(
        &self,
        school_id: Uuid,
        status: Option<StudentStatus>,
    ) -> AppResult<Vec<MemberSummary>> {
        let t = self.lock()?;
        let mut members: Vec<MemberSummary> = t
            .students
            .values()
            .filter(|s| s.school_id == school_id && status.map_or(true, |wanted| s.status == wanted))
            .filter_map(|s| t.member(s.id, Some(s.status), None, s.created_at))
            .collect();
        members.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(members)
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation> {
        let mut t = self.lock()?;
        let duplicate = t.invitations.values().any(|i| {
            i.invitation_token == invitation.invitation_token
                || (invitation.code.is_some() && i.code == invitation.code)
        });
        if duplicate {
            return Err(AppError::Internal("invitation token or code already in use".into()));
        }

        let created = Invitation {
            id: Uuid::new_v4(),
            school_id: invitation.school_id,
            kind: invitation.kind,
            email: invitation.email,
            code: invitation.code,
            status: InvitationStatus::Pending,
            invitation_token: invitation.invitation_token,
            invited_by: invitation.invited_by,
            expires_at: invitation.expires_at,
            accepted_by: None,
            accepted_at: None,
            created_at: Utc::now(),
        };
        t.invitations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_invitation(&self, token_or_code: &str) -> AppResult<Option<Invitation>> {
        let t = self.lock()?;
        let code = token_or_code.to_uppercase();
        Ok(t.invitations
            .values()
            .find(|i| i.invitation_token == token_or_code || i.code.as_deref() == Some(code.as_str()))
            .cloned())
    }

    async fn get_invitation(&self, id: Uuid) -> AppResult<Option<Invitation>> {
        Ok(self.lock()?.invitations.get(&id).cloned())
    }

    async fn accept_invitation(&self, accept: AcceptInvitation) -> AppResult<()> {
        let mut t = self.lock()?;

        let invitation = t
            .invitations
            .get_mut(&accept.invitation_id)
            .filter(|i| i.status == InvitationStatus::Pending)
            .ok_or(AppError::AlreadyAccepted)?;
        invitation.status = InvitationStatus::Accepted;
        invitation.accepted_by = Some(accept.user_id);
        invitation.accepted_at = Some(accept.accepted_at);

        t.set_profile_role(
            accept.user_id,
            &accept.full_name,
            &accept.email,
            accept.kind.user_type(),
            accept.school_id,
            accept.accepted_at,
        );

        match accept.kind {
            InvitationKind::Teacher => {
                t.teachers.entry(accept.user_id).or_insert_with(|| Teacher {
                    id: accept.user_id,
                    school_id: accept.school_id,
                    is_supervisor: false,
                    created_at: accept.accepted_at,
                });
            }
            InvitationKind::Student => {
                let student = t.students.entry(accept.user_id).or_insert_with(|| Student {
                    id: accept.user_id,
                    school_id: accept.school_id,
                    status: StudentStatus::Active,
                    created_at: accept.accepted_at,
                    updated_at: accept.accepted_at,
                });
                if student.school_id == accept.school_id {
                    student.status = StudentStatus::Active;
                    student.updated_at = accept.accepted_at;
                }
            }
        }
        Ok(())
    }

    async fn list_invitations(
        &self,
        school_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> AppResult<Vec<Invitation>> {
        let t = self.lock()?;
        let mut invitations: Vec<Invitation> = t
            .invitations
            .values()
            .filter(|i| i.school_id == school_id && status.map_or(true, |wanted| i.status == wanted))
            .cloned()
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }

    async fn delete_pending_invitation(&self, id: Uuid) -> AppResult<bool> {
        let mut t = self.lock()?;
        let pending = t
            .invitations
            .get(&id)
            .is_some_and(|i| i.status == InvitationStatus::Pending);
        if pending {
            t.invitations.remove(&id);
        }
        Ok(pending)
    }

    async fn expire_invitations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut t = self.lock()?;
        let mut expired = 0;
        for invitation in t.invitations.values_mut() {
            if invitation.status == InvitationStatus::Pending && invitation.expires_at <= now {
                invitation.status = InvitationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn create_conversation(
        &self,
        owner_id: Uuid,
        school_id: Option<Uuid>,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_id,
            school_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut t = self.lock()?;
        t.require_profile(owner_id)?;
        t.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.lock()?.conversations.get(&id).cloned())
    }

    async fn list_conversations(&self, owner_id: Uuid) -> AppResult<Vec<Conversation>> {
        let t = self.lock()?;
        let mut conversations: Vec<Conversation> = t
            .conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn add_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ChatMessage> {
        let mut t = self.lock()?;
        let conversation = t
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;
        conversation.updated_at = now;

        let message = ChatMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        };
        t.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let t = self.lock()?;
        // Insertion order is chronological.
        Ok(t.messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> AppResult<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            uploader_id: doc.uploader_id,
            school_id: doc.school_id,
            title: doc.title,
            file_name: doc.file_name,
            storage_path: doc.storage_path,
            content_type: doc.content_type,
            size_bytes: doc.size_bytes,
            created_at: now,
        };
        let mut t = self.lock()?;
        t.require_profile(document.uploader_id)?;
        t.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }

    async fn list_documents(&self, uploader_id: Uuid, school_id: Option<Uuid>) -> AppResult<Vec<Document>> {
        let t = self.lock()?;
        let mut documents: Vec<Document> = t
            .documents
            .values()
            .filter(|d| d.uploader_id == uploader_id || (school_id.is_some() && d.school_id == school_id))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn delete_document(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.lock()?.documents.remove(&id).is_some())
    }

    async fn start_session(
        &self,
        user_id: Uuid,
        school_id: Option<Uuid>,
        activity: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SessionLog> {
        let session = SessionLog {
            id: Uuid::new_v4(),
            user_id,
            school_id,
            activity: activity.to_string(),
            started_at: now,
            ended_at: None,
        };
        let mut t = self.lock()?;
        t.require_profile(user_id)?;
        t.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> AppResult<Option<SessionLog>> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn end_session(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<SessionLog>> {
        let mut t = self.lock()?;
        Ok(t.sessions.get_mut(&id).map(|session| {
            session.ended_at.get_or_insert(now);
            session.clone()
        }))
    }

    async fn usage_summary(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<UsageSummary> {
        let t = self.lock()?;
        let in_window: Vec<&SessionLog> = t
            .sessions
            .values()
            .filter(|s| s.school_id == Some(school_id) && s.started_at >= since)
            .collect();

        let mut users: Vec<Uuid> = in_window.iter().map(|s| s.user_id).collect();
        users.sort();
        users.dedup();

        let total_minutes = in_window
            .iter()
            .filter_map(|s| s.ended_at.map(|end| (end - s.started_at).num_minutes()))
            .sum();

        Ok(UsageSummary {
            school_id,
            since,
            sessions: in_window.len() as i64,
            active_users: users.len() as i64,
            total_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_school(admin_id: Uuid, code: &str) -> NewSchool {
        let now = Utc::now();
        NewSchool {
            name: "Lincoln High".into(),
            admin_id,
            admin_full_name: "Ada Admin".into(),
            admin_email: "ada@lincoln.edu".into(),
            code: code.into(),
            code_expires_at: now + Duration::hours(24),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_school_assigns_admin() {
        let store = MemoryStore::new();
        let admin = Uuid::new_v4();
        let school = store.create_school(new_school(admin, "SCHABCDEF")).await.unwrap();

        assert_eq!(store.admin_school(admin).await.unwrap(), Some(school.id));
        let profile = store.get_profile(admin).await.unwrap().unwrap();
        assert_eq!(profile.user_type, Some(UserType::SchoolAdmin));
        assert_eq!(profile.school_id, Some(school.id));
    }

    fn update(school: &School, code: &str, max_per_window: i64) -> SchoolCodeUpdate {
        let now = Utc::now();
        SchoolCodeUpdate {
            school_id: school.id,
            code: code.into(),
            expires_at: now + Duration::hours(24),
            generated_by: school.created_by,
            generated_at: now,
            window_start: now - Duration::hours(24),
            max_per_window,
        }
    }

    #[tokio::test]
    async fn test_store_school_code_rejects_code_of_other_school() {
        let store = MemoryStore::new();
        let a = store.create_school(new_school(Uuid::new_v4(), "SCHAAAAAA")).await.unwrap();
        let b = store.create_school(new_school(Uuid::new_v4(), "SCHBBBBBB")).await.unwrap();

        let outcome = store.store_school_code(update(&b, "SCHAAAAAA", 5)).await.unwrap();
        assert_eq!(outcome, CodeUpdateOutcome::Taken);
        assert!(store.code_taken("SCHAAAAAA").await.unwrap());
        assert_eq!(store.get_school(a.id).await.unwrap().unwrap().code.as_deref(), Some("SCHAAAAAA"));
    }

    #[tokio::test]
    async fn test_store_school_code_counts_registration_against_window() {
        let store = MemoryStore::new();
        let school = store.create_school(new_school(Uuid::new_v4(), "SCHCCCCCC")).await.unwrap();

        let outcome = store.store_school_code(update(&school, "SCHDDDDDD", 2)).await.unwrap();
        assert_eq!(outcome, CodeUpdateOutcome::Stored);

        let outcome = store.store_school_code(update(&school, "SCHEEEEEE", 2)).await.unwrap();
        assert_eq!(outcome, CodeUpdateOutcome::RateLimited { recent: 2 });
        let school = store.get_school(school.id).await.unwrap().unwrap();
        assert_eq!(school.code.as_deref(), Some("SCHDDDDDD"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_regenerations_never_exceed_window() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let school = store.create_school(new_school(Uuid::new_v4(), "SCHFFFFFF")).await.unwrap();

        let mut handles = Vec::new();
        for code in ["SCHGGGGGG", "SCHHHHHHH", "SCHJJJJJJ", "SCHKKKKKK", "SCHMMMMMM", "SCHNNNNNN"] {
            let store = store.clone();
            let change = update(&school, code, 5);
            handles.push(tokio::spawn(async move { store.store_school_code(change).await.unwrap() }));
        }
        let mut stored = 0;
        for handle in handles {
            if handle.await.unwrap() == CodeUpdateOutcome::Stored {
                stored += 1;
            }
        }
        assert_eq!(stored, 4);
    }

    #[tokio::test]
    async fn test_end_session_keeps_first_end_time() {
        let store = MemoryStore::new();
        let start = Utc::now();
        let user = Uuid::new_v4();
        store.ensure_profile(user, "sam", "sam@lincoln.edu").await.unwrap();
        let session = store.start_session(user, None, "chat", start).await.unwrap();

        let first = store.end_session(session.id, start + Duration::minutes(10)).await.unwrap().unwrap();
        let second = store.end_session(session.id, start + Duration::minutes(30)).await.unwrap().unwrap();
        assert_eq!(first.ended_at, second.ended_at);
    }

    #[tokio::test]
    async fn test_owned_rows_require_profile() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();

        let err = store.create_conversation(user, None, "Fractions", now).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(store.start_session(user, None, "chat", now).await.is_err());

        store.ensure_profile(user, "sam", "sam@lincoln.edu").await.unwrap();
        store.upsert_profile(user, "Sam Student", "sam@lincoln.edu").await.unwrap();
        let kept = store.ensure_profile(user, "sam", "sam@lincoln.edu").await.unwrap();
        assert_eq!(kept.full_name, "Sam Student");
        assert!(store.create_conversation(user, None, "Fractions", now).await.is_ok());
    }
}
