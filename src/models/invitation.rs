use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationKind {
    Teacher,
    Student,
}

impl InvitationKind {
    /// Profile type granted when an invitation of this kind is accepted.
    pub fn user_type(self) -> UserType {
        match self {
            InvitationKind::Teacher => UserType::Teacher,
            InvitationKind::Student => UserType::Student,
        }
    }
}

impl std::fmt::Display for InvitationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvitationKind::Teacher => "teacher",
            InvitationKind::Student => "student",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InvitationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(InvitationKind::Teacher),
            "student" => Ok(InvitationKind::Student),
            _ => Err(anyhow::anyhow!("Unknown invitation kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InvitationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "expired" => Ok(InvitationStatus::Expired),
            _ => Err(anyhow::anyhow!("Unknown invitation status: {s}")),
        }
    }
}

/// Teacher and student invitations share one table; exactly one of `email`
/// and `code` is set.
#[derive(Debug, Clone, Serialize)]
pub struct Invitation {
    pub id: Uuid,
    pub school_id: Uuid,
    pub kind: InvitationKind,
    pub email: Option<String>,
    pub code: Option<String>,
    pub status: InvitationStatus,
    #[serde(skip_serializing)]
    pub invitation_token: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Expired || self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub school_id: Uuid,
    pub kind: InvitationKind,
    pub email: Option<String>,
    pub code: Option<String>,
    pub invitation_token: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Input to the atomic accept sequence.
#[derive(Debug, Clone)]
pub struct AcceptInvitation {
    pub invitation_id: Uuid,
    pub school_id: Uuid,
    pub kind: InvitationKind,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteMethod {
    Email,
    Code,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct InviteTeacherRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteStudentRequest {
    pub method: InviteMethod,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyInvitationQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub token: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvitationQuery {
    pub status: Option<InvitationStatus>,
}

/// Returned to the issuer. The token is only ever shown here.
#[derive(Debug, Serialize)]
pub struct IssuedInvitation {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub invitation_token: String,
    pub invite_url: String,
}

#[derive(Debug, Serialize)]
pub struct InvitationVerification {
    pub valid: bool,
    pub school_id: Uuid,
    pub school_name: String,
    pub email: Option<String>,
    pub kind: InvitationKind,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AcceptedInvitation {
    pub school_id: Uuid,
    pub role: UserType,
}
