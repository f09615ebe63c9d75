use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub school_id: Option<Uuid>,
    pub activity: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UsageSummary {
    pub school_id: Uuid,
    pub since: DateTime<Utc>,
    pub sessions: i64,
    pub active_users: i64,
    pub total_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub activity: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub days: Option<i64>,
}
