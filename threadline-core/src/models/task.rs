use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
            is_locked: false,
            created_at: Utc::now(),
        }
    }
}

serde_entity!(Task, EntityKind::Task, SortOrder::NewestFirst, tasks, locked = is_locked);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

/// A habit to keep, tracked by how often it was kept or broken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoItem {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

impl DoItem {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            title: title.into(),
            success_count: 0,
            failure_count: 0,
            is_locked: false,
            created_at: Utc::now(),
        }
    }
}

serde_entity!(DoItem, EntityKind::DoItem, SortOrder::OldestFirst, do_items, locked = is_locked);

/// Entities counting kept and broken attempts.
pub trait Tally: super::Entity {
    fn success_count_mut(&mut self) -> &mut u32;
    fn failure_count_mut(&mut self) -> &mut u32;
}

impl Tally for DoItem {
    fn success_count_mut(&mut self) -> &mut u32 {
        &mut self.success_count
    }

    fn failure_count_mut(&mut self) -> &mut u32 {
        &mut self.failure_count
    }
}

/// A habit to avoid. Same counters as [`DoItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DontItem {
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

impl DontItem {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            project_id: project_id.into(),
            title: title.into(),
            success_count: 0,
            failure_count: 0,
            is_locked: false,
            created_at: Utc::now(),
        }
    }
}

serde_entity!(DontItem, EntityKind::DontItem, SortOrder::OldestFirst, dont_items, locked = is_locked);

impl Tally for DontItem {
    fn success_count_mut(&mut self) -> &mut u32 {
        &mut self.success_count
    }

    fn failure_count_mut(&mut self) -> &mut u32 {
        &mut self.failure_count
    }
}
