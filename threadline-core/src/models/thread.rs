use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, Entity, EntityKind, SortOrder};
use crate::cache::{Collection, EntityCache};
use crate::codec;
use crate::error::CodecError;
use crate::store::Record;

/// A discussion entry under a problem. Items nest through `parent_id`;
/// root items have no parent and belong to the problem directly.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadItem {
    pub id: String,
    pub problem_id: String,
    pub parent_id: Option<String>,
    pub child_thread_ids: Vec<String>,
    pub content: String,
    pub is_important: bool,
    pub result_ids: Vec<String>,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub kind: ThreadKind,
}

/// Variant-specific part of a [`ThreadItem`].
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadKind {
    General,
    Insight,
    Bottleneck {
        is_resolved: bool,
    },
    Task {
        is_completed: bool,
    },
    Action {
        status: ActionStatus,
        /// Minutes
        time_spent: u32,
        deadline: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    },
    Session {
        /// Seconds
        time_spent: i64,
        start_time: DateTime<Utc>,
    },
}

impl ThreadKind {
    pub fn thread_type(&self) -> ThreadType {
        match self {
            Self::General => ThreadType::General,
            Self::Insight => ThreadType::Insight,
            Self::Bottleneck { .. } => ThreadType::Bottleneck,
            Self::Task { .. } => ThreadType::Task,
            Self::Action { .. } => ThreadType::Action,
            Self::Session { .. } => ThreadType::Session,
        }
    }

    /// The variant for `ty` with every variant field at its default.
    pub fn default_for(ty: ThreadType, created_at: DateTime<Utc>) -> Self {
        match ty {
            ThreadType::General => Self::General,
            ThreadType::Insight => Self::Insight,
            ThreadType::Bottleneck => Self::Bottleneck { is_resolved: false },
            ThreadType::Task => Self::Task {
                is_completed: false,
            },
            ThreadType::Action => Self::Action {
                status: ActionStatus::Todo,
                time_spent: 0,
                deadline: None,
                completed_at: None,
            },
            ThreadType::Session => Self::Session {
                time_spent: 0,
                start_time: created_at,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ThreadType {
    General,
    Insight,
    Bottleneck,
    Task,
    Action,
    Session,
}

impl ThreadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Insight => "Insight",
            Self::Bottleneck => "Bottleneck",
            Self::Task => "Task",
            Self::Action => "Action",
            Self::Session => "Session",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "General" => Some(Self::General),
            "Insight" => Some(Self::Insight),
            "Bottleneck" => Some(Self::Bottleneck),
            "Task" => Some(Self::Task),
            "Action" => Some(Self::Action),
            "Session" => Some(Self::Session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ActionStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "inProgress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "inProgress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl ThreadItem {
    pub fn new(problem_id: impl Into<String>, ty: ThreadType, content: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: new_id(),
            problem_id: problem_id.into(),
            parent_id: None,
            child_thread_ids: Vec::new(),
            content: content.into(),
            is_important: false,
            result_ids: Vec::new(),
            author_id: String::new(),
            created_at,
            kind: ThreadKind::default_for(ty, created_at),
        }
    }

    pub fn reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_kind(mut self, kind: ThreadKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn thread_type(&self) -> ThreadType {
        self.kind.thread_type()
    }

    /// Switch variant, dropping the fields of the previous one.
    pub fn change_type(&mut self, ty: ThreadType) {
        if self.thread_type() != ty {
            self.kind = ThreadKind::default_for(ty, self.created_at);
        }
    }
}

impl Entity for ThreadItem {
    const KIND: EntityKind = EntityKind::ThreadItem;
    const SORT: SortOrder = SortOrder::OldestFirst;

    fn id(&self) -> &str {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, id: String, created_at: DateTime<Utc>) {
        self.id = id;
        self.created_at = created_at;
    }

    fn assign_author(&mut self, author_id: &str) {
        if self.author_id.is_empty() {
            self.author_id = author_id.to_string();
        }
    }

    fn to_record(&self) -> Result<Record, CodecError> {
        Ok(codec::thread::serialize(self))
    }

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        codec::thread::parse(record)
    }

    fn collection(cache: &EntityCache) -> &Collection<Self> {
        &cache.thread_items
    }

    fn collection_mut(cache: &mut EntityCache) -> &mut Collection<Self> {
        &mut cache.thread_items
    }
}
