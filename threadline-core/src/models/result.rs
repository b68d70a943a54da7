use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

/// An outcome recorded against a thread item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadResult {
    pub id: String,
    pub parent_thread_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ThreadResult {
    pub fn new(parent_thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            parent_thread_id: parent_thread_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

serde_entity!(ThreadResult, EntityKind::ThreadResult, SortOrder::OldestFirst, results);
