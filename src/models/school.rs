use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl School {
    /// A code only admits new students while it has not passed its expiry.
    pub fn code_is_active(&self, now: DateTime<Utc>) -> bool {
        match (&self.code, self.code_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }
}

/// Everything created together when an administrator registers a school.
#[derive(Debug, Clone)]
pub struct NewSchool {
    pub name: String,
    pub admin_id: Uuid,
    pub admin_full_name: String,
    pub admin_email: String,
    pub code: String,
    pub code_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A code regeneration. The store counts earlier generations since
/// `window_start` under the same lock as the write, so concurrent requests
/// cannot both slip under `max_per_window`.
#[derive(Debug, Clone)]
pub struct SchoolCodeUpdate {
    pub school_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub generated_by: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub max_per_window: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUpdateOutcome {
    Stored,
    /// Another school or invitation holds the code.
    Taken,
    /// `max_per_window` generations already happened in the window.
    RateLimited { recent: i64 },
}

/// Student self-service signup with a school code.
#[derive(Debug, Clone)]
pub struct JoinSchool {
    pub school_id: Uuid,
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterSchoolRequest {
    pub name: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinSchoolRequest {
    pub code: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct SchoolCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredSchool {
    pub school: School,
    pub code: SchoolCodeResponse,
}
