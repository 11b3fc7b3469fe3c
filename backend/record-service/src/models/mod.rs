/// Data models for record-service
///
/// - Record: the durable entity owned by the repository
/// - RecordPage: one page of live records plus the live total
/// - Visibility: whether a lookup may return soft-deleted rows
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on record content, in characters
pub const MAX_CONTENT_LEN: usize = 1000;

/// Upper bound on a list page
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Row visibility for repository lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Soft-deleted rows are treated as absent
    #[default]
    Live,
    IncludeDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}
