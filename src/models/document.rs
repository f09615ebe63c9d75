use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata of a file that already lives in object storage.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub school_id: Option<Uuid>,
    pub title: String,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub uploader_id: Uuid,
    pub school_id: Option<Uuid>,
    pub title: String,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDocumentRequest {
    pub title: String,
    pub file_name: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub content_type: Option<String>,
}
