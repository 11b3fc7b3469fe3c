//! Record event wire format
//!
//! A flat JSON object keyed by the record id:
//! `{"id", "event_type", "content", "created_at", "updated_at"}`.
//! Deletions carry only `id` and `event_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }

    /// Value of the `event_type` message header
    pub fn header_value(&self) -> &'static str {
        match self {
            EventKind::Created => "record.created",
            EventKind::Updated => "record.updated",
            EventKind::Deleted => "record.deleted",
        }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "record.created" => Some(EventKind::Created),
            "record.updated" => Some(EventKind::Updated),
            "record.deleted" => Some(EventKind::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEvent {
    pub id: Uuid,
    pub event_type: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RecordEvent {
    /// Snapshot `record` as an event of `kind`
    pub fn from_record(record: &Record, kind: EventKind) -> Self {
        if kind == EventKind::Deleted {
            return Self::deleted(record.id);
        }

        Self {
            id: record.id,
            event_type: kind,
            content: Some(record.content.clone()),
            created_at: Some(record.created_at),
            updated_at: Some(record.updated_at),
        }
    }

    pub fn deleted(id: Uuid) -> Self {
        Self {
            id,
            event_type: EventKind::Deleted,
            content: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Every event for one record lands in the same partition
    pub fn partition_key(&self) -> String {
        self.id.to_string()
    }
}
