use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Student,
    Teacher,
    SchoolAdmin,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserType::Student => "student",
            UserType::Teacher => "teacher",
            UserType::SchoolAdmin => "school_admin",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserType::Student),
            "teacher" => Ok(UserType::Teacher),
            "school_admin" => Ok(UserType::SchoolAdmin),
            _ => Err(anyhow::anyhow!("Unknown user type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Pending,
    Active,
}

impl std::fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StudentStatus::Pending => "pending",
            StudentStatus::Active => "active",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StudentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StudentStatus::Pending),
            "active" => Ok(StudentStatus::Active),
            _ => Err(anyhow::anyhow!("Unknown student status: {s}")),
        }
    }
}

/// One profile per identity. `user_type` and `school_id` stay empty until the
/// identity is attached to a school.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub user_type: Option<UserType>,
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub school_id: Uuid,
    pub is_supervisor: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub school_id: Uuid,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Teacher or student row joined with its profile, for school rosters.
#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub status: Option<StudentStatus>,
    pub is_supervisor: Option<bool>,
    pub created_at: DateTime<Utc>,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetSupervisorRequest {
    pub is_supervisor: bool,
}

#[derive(Debug, Deserialize)]
pub struct StudentQuery {
    pub status: Option<StudentStatus>,
}
