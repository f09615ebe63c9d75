use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
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
        user::{MemberSummary, Profile, Student, StudentStatus, Teacher},
    },
};

const SCHOOL_COLUMNS: &str = "id, name, code, code_expires_at, created_by, created_at";
const PROFILE_COLUMNS: &str = "id, full_name, email, user_type, school_id, created_at, updated_at";
const STUDENT_COLUMNS: &str = "id, school_id, status, created_at, updated_at";
const TEACHER_COLUMNS: &str = "id, school_id, is_supervisor, created_at";
const INVITATION_COLUMNS: &str = "id, school_id, kind, email, code, status, invitation_token, \
     invited_by, expires_at, accepted_by, accepted_at, created_at";
const CONVERSATION_COLUMNS: &str = "id, owner_id, school_id, title, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, role, content, created_at";
const DOCUMENT_COLUMNS: &str =
    "id, uploader_id, school_id, title, file_name, storage_path, content_type, size_bytes, created_at";
const SESSION_COLUMNS: &str = "id, user_id, school_id, activity, started_at, ended_at";

/// Enumerations are stored as TEXT with CHECK constraints; these row structs
/// carry the raw strings and are parsed into the domain types on the way out.
#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    full_name: String,
    email: String,
    user_type: Option<String>,
    school_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = AppError;

    fn try_from(r: ProfileRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            user_type: r.user_type.map(|t| t.parse()).transpose()?,
            school_id: r.school_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct StudentRow {
    id: Uuid,
    school_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StudentRow> for Student {
    type Error = AppError;

    fn try_from(r: StudentRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            school_id: r.school_id,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    id: Uuid,
    full_name: String,
    email: String,
    status: Option<String>,
    is_supervisor: Option<bool>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for MemberSummary {
    type Error = AppError;

    fn try_from(r: MemberRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            status: r.status.map(|s| s.parse()).transpose()?,
            is_supervisor: r.is_supervisor,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct InvitationRow {
    id: Uuid,
    school_id: Uuid,
    kind: String,
    email: Option<String>,
    code: Option<String>,
    status: String,
    invitation_token: String,
    invited_by: Uuid,
    expires_at: DateTime<Utc>,
    accepted_by: Option<Uuid>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = AppError;

    fn try_from(r: InvitationRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            school_id: r.school_id,
            kind: r.kind.parse()?,
            email: r.email,
            code: r.code,
            status: r.status.parse()?,
            invitation_token: r.invitation_token,
            invited_by: r.invited_by,
            expires_at: r.expires_at,
            accepted_by: r.accepted_by,
            accepted_at: r.accepted_at,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = AppError;

    fn try_from(r: MessageRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            conversation_id: r.conversation_id,
            role: r.role.parse()?,
            content: r.content,
            created_at: r.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL implementation of [`Store`]. Multi-table writes run in one
/// transaction; dropping an uncommitted transaction rolls it back.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_school(&self, school: NewSchool) -> AppResult<School> {
        let mut tx = self.pool.begin().await?;

        let created: School = sqlx::query_as(&format!(
            "INSERT INTO schools (name, code, code_expires_at, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SCHOOL_COLUMNS}"
        ))
        .bind(&school.name)
        .bind(&school.code)
        .bind(school.code_expires_at)
        .bind(school.admin_id)
        .bind(school.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO profiles (id, full_name, email, user_type, school_id)
             VALUES ($1, $2, $3, 'school_admin', $4)
             ON CONFLICT (id) DO UPDATE
               SET full_name = EXCLUDED.full_name, email = EXCLUDED.email,
                   user_type = 'school_admin', school_id = EXCLUDED.school_id, updated_at = NOW()",
        )
        .bind(school.admin_id)
        .bind(&school.admin_full_name)
        .bind(&school.admin_email)
        .bind(created.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO school_admins (user_id, school_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(school.admin_id)
        .bind(created.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO code_generation_log (school_id, generated_by, code, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(created.id)
        .bind(school.admin_id)
        .bind(&school.code)
        .bind(school.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_school(&self, id: Uuid) -> AppResult<Option<School>> {
        let school = sqlx::query_as(&format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(school)
    }

    async fn find_school_by_code(&self, code: &str) -> AppResult<Option<School>> {
        let school = sqlx::query_as(&format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(school)
    }

    async fn code_taken(&self, code: &str) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM schools WHERE code = $1)
                 OR EXISTS(SELECT 1 FROM invitations WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn store_school_code(&self, update: SchoolCodeUpdate) -> AppResult<CodeUpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes regenerations of the same school.
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM schools WHERE id = $1 FOR UPDATE")
            .bind(update.school_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::not_found("School not found"));
        }

        let recent: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM code_generation_log WHERE school_id = $1 AND created_at > $2",
        )
        .bind(update.school_id)
        .bind(update.window_start)
        .fetch_one(&mut *tx)
        .await?;
        if recent >= update.max_per_window {
            return Ok(CodeUpdateOutcome::RateLimited { recent });
        }

        let updated = sqlx::query("UPDATE schools SET code = $2, code_expires_at = $3 WHERE id = $1")
            .bind(update.school_id)
            .bind(&update.code)
            .bind(update.expires_at)
            .execute(&mut *tx)
            .await;

        match updated {
            // Another school took the same code between the check and the update.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Ok(CodeUpdateOutcome::Taken),
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }

        sqlx::query(
            "INSERT INTO code_generation_log (school_id, generated_by, code, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(update.school_id)
        .bind(update.generated_by)
        .bind(&update.code)
        .bind(update.generated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CodeUpdateOutcome::Stored)
    }

    async fn count_code_generations(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM code_generation_log WHERE school_id = $1 AND created_at > $2",
        )
        .bind(school_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn upsert_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile> {
        let row: ProfileRow = sqlx::query_as(&format!(
            "INSERT INTO profiles (id, full_name, email) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE
               SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, updated_at = NOW()
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn ensure_profile(&self, id: Uuid, full_name: &str, email: &str) -> AppResult<Profile> {
        sqlx::query("INSERT INTO profiles (id, full_name, email) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING")
            .bind(id)
            .bind(full_name)
            .bind(email)
            .execute(&self.pool)
            .await?;
        self.get_profile(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("profile {id} vanished after insert")))
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn admin_school(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
        let school_id = sqlx::query_scalar(
            "SELECT school_id FROM school_admins WHERE user_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(school_id)
    }

    async fn get_teacher(&self, id: Uuid) -> AppResult<Option<Teacher>> {
        let teacher = sqlx::query_as(&format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(teacher)
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        let row: Option<StudentRow> =
            sqlx::query_as(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Student::try_from).transpose()
    }

    async fn list_teachers(&self, school_id: Uuid) -> AppResult<Vec<MemberSummary>> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT t.id, p.full_name, p.email, NULL::TEXT AS status,
                    t.is_supervisor, t.created_at
             FROM teachers t
             JOIN profiles p ON p.id = t.id
             WHERE t.school_id = $1
             ORDER BY p.full_name",
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn set_teacher_supervisor(&self, id: Uuid, is_supervisor: bool) -> AppResult<Option<Teacher>> {
        let teacher = sqlx::query_as(&format!(
            "UPDATE teachers SET is_supervisor = $2 WHERE id = $1 RETURNING {TEACHER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_supervisor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(teacher)
    }

    async fn join_school(&self, join: JoinSchool) -> AppResult<Student> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO profiles (id, full_name, email, user_type, school_id)
             VALUES ($1, $2, $3, 'student', $4)
             ON CONFLICT (id) DO UPDATE
               SET full_name = EXCLUDED.full_name, email = EXCLUDED.email,
                   user_type = 'student', school_id = EXCLUDED.school_id, updated_at = NOW()",
        )
        .bind(join.student_id)
        .bind(&join.full_name)
        .bind(&join.email)
        .bind(join.school_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO students (id, school_id, status, created_at, updated_at)
             VALUES ($1, $2, 'pending', $3, $3)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(join.student_id)
        .bind(join.school_id)
        .bind(join.joined_at)
        .execute(&mut *tx)
        .await?;

        let row: StudentRow =
            sqlx::query_as(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"))
                .bind(join.student_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn activate_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        let row: Option<StudentRow> = sqlx::query_as(&format!(
            "UPDATE students SET status = 'active', updated_at = NOW()
             WHERE id = $1
             RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Student::try_from).transpose()
    }

    async fn revoke_student(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE profiles SET user_type = NULL, school_id = NULL, updated_at = NOW()
             WHERE id = $1 AND user_type = 'student'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_students(
        &self,
        school_id: Uuid,
        status: Option<StudentStatus>,
    ) -> AppResult<Vec<MemberSummary>> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT s.id, p.full_name, p.email, s.status,
                    NULL::BOOLEAN AS is_supervisor, s.created_at
             FROM students s
             JOIN profiles p ON p.id = s.id
             WHERE s.school_id = $1 AND ($2::TEXT IS NULL OR s.status = $2)
             ORDER BY p.full_name",
        )
        .bind(school_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_invitation(&self, invitation: NewInvitation) -> AppResult<Invitation> {
        let row: InvitationRow = sqlx::query_as(&format!(
            "INSERT INTO invitations
                (school_id, kind, email, code, invitation_token, invited_by, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(invitation.school_id)
        .bind(invitation.kind.to_string())
        .bind(&invitation.email)
        .bind(&invitation.code)
        .bind(&invitation.invitation_token)
        .bind(invitation.invited_by)
        .bind(invitation.expires_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_invitation(&self, token_or_code: &str) -> AppResult<Option<Invitation>> {
        let row: Option<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE invitation_token = $1 OR code = UPPER($1)"
        ))
        .bind(token_or_code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn get_invitation(&self, id: Uuid) -> AppResult<Option<Invitation>> {
        let row: Option<InvitationRow> =
            sqlx::query_as(&format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn accept_invitation(&self, accept: AcceptInvitation) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Claim first: of two concurrent accepts only one sees a pending row.
        let claimed = sqlx::query(
            "UPDATE invitations SET status = 'accepted', accepted_by = $2, accepted_at = $3
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(accept.invitation_id)
        .bind(accept.user_id)
        .bind(accept.accepted_at)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(AppError::AlreadyAccepted);
        }

        sqlx::query(
            "INSERT INTO profiles (id, full_name, email, user_type, school_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
               SET full_name = EXCLUDED.full_name, email = EXCLUDED.email,
                   user_type = EXCLUDED.user_type, school_id = EXCLUDED.school_id, updated_at = NOW()",
        )
        .bind(accept.user_id)
        .bind(&accept.full_name)
        .bind(&accept.email)
        .bind(accept.kind.user_type().to_string())
        .bind(accept.school_id)
        .execute(&mut *tx)
        .await?;

        match accept.kind {
            InvitationKind::Teacher => {
                sqlx::query(
                    "INSERT INTO teachers (id, school_id) VALUES ($1, $2)
                     ON CONFLICT (id) DO NOTHING",
                )
                .bind(accept.user_id)
                .bind(accept.school_id)
                .execute(&mut *tx)
                .await?;
            }
            InvitationKind::Student => {
                sqlx::query(
                    "INSERT INTO students (id, school_id, status, created_at, updated_at)
                     VALUES ($1, $2, 'active', $3, $3)
                     ON CONFLICT (id) DO UPDATE SET status = 'active', updated_at = NOW()
                     WHERE students.school_id = EXCLUDED.school_id",
                )
                .bind(accept.user_id)
                .bind(accept.school_id)
                .bind(accept.accepted_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_invitations(
        &self,
        school_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> AppResult<Vec<Invitation>> {
        let rows: Vec<InvitationRow> = sqlx::query_as(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE school_id = $1 AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC"
        ))
        .bind(school_id)
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn delete_pending_invitation(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM invitations WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_invitations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE invitations SET status = 'expired'
             WHERE status = 'pending' AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_conversation(
        &self,
        owner_id: Uuid,
        school_id: Option<Uuid>,
        title: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Conversation> {
        let conversation = sqlx::query_as(&format!(
            "INSERT INTO conversations (owner_id, school_id, title, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(school_id)
        .bind(title)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(conversation)
    }

    async fn get_conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let conversation =
            sqlx::query_as(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(conversation)
    }

    async fn list_conversations(&self, owner_id: Uuid) -> AppResult<Vec<Conversation>> {
        let conversations = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE owner_id = $1
             ORDER BY updated_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    async fn add_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> AppResult<ChatMessage> {
        let mut tx = self.pool.begin().await?;

        let row: MessageRow = sqlx::query_as(&format!(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(conversation_id)
        .bind(role.to_string())
        .bind(content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn list_messages(&self, conversation_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn create_document(&self, doc: NewDocument, now: DateTime<Utc>) -> AppResult<Document> {
        let document = sqlx::query_as(&format!(
            "INSERT INTO documents
                (uploader_id, school_id, title, file_name, storage_path, content_type, size_bytes, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(doc.uploader_id)
        .bind(doc.school_id)
        .bind(&doc.title)
        .bind(&doc.file_name)
        .bind(&doc.storage_path)
        .bind(&doc.content_type)
        .bind(doc.size_bytes)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> AppResult<Option<Document>> {
        let document =
            sqlx::query_as(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(document)
    }

    async fn list_documents(&self, uploader_id: Uuid, school_id: Option<Uuid>) -> AppResult<Vec<Document>> {
        let documents = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE uploader_id = $1 OR ($2::UUID IS NOT NULL AND school_id = $2)
             ORDER BY created_at DESC"
        ))
        .bind(uploader_id)
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents)
    }

    async fn delete_document(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn start_session(
        &self,
        user_id: Uuid,
        school_id: Option<Uuid>,
        activity: &str,
        now: DateTime<Utc>,
    ) -> AppResult<SessionLog> {
        let session = sqlx::query_as(&format!(
            "INSERT INTO session_logs (user_id, school_id, activity, started_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(school_id)
        .bind(activity)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> AppResult<Option<SessionLog>> {
        let session =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM session_logs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn end_session(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<SessionLog>> {
        let session = sqlx::query_as(&format!(
            "UPDATE session_logs SET ended_at = COALESCE(ended_at, $2)
             WHERE id = $1
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn usage_summary(&self, school_id: Uuid, since: DateTime<Utc>) -> AppResult<UsageSummary> {
        let (sessions, active_users, total_minutes): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*)::BIGINT,
                    COUNT(DISTINCT user_id)::BIGINT,
                    COALESCE(SUM(FLOOR(EXTRACT(EPOCH FROM (ended_at - started_at)) / 60))
                             FILTER (WHERE ended_at IS NOT NULL), 0)::BIGINT
             FROM session_logs
             WHERE school_id = $1 AND started_at >= $2",
        )
        .bind(school_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(UsageSummary { school_id, since, sessions, active_users, total_minutes })
    }
}
