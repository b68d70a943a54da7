mod goal;
mod problem;
mod project;
mod report;
mod result;
mod session;
mod task;
mod thread;

pub use goal::*;
pub use problem::*;
pub use project::*;
pub use report::*;
pub use result::*;
pub use session::*;
pub use task::*;
pub use thread::*;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{Collection, EntityCache};
use crate::error::CodecError;
use crate::store::Record;

/// Every entity type persisted by the engine, one table each.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Persona,
    Objective,
    Gap,
    Problem,
    Project,
    ThreadItem,
    ThreadResult,
    Task,
    DoItem,
    DontItem,
    StarReport,
    RetrospectiveReport,
    ActiveSession,
}

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        Self::User,
        Self::Persona,
        Self::Objective,
        Self::Gap,
        Self::Problem,
        Self::Project,
        Self::ThreadItem,
        Self::ThreadResult,
        Self::Task,
        Self::DoItem,
        Self::DontItem,
        Self::StarReport,
        Self::RetrospectiveReport,
        Self::ActiveSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Persona => "persona",
            Self::Objective => "objective",
            Self::Gap => "gap",
            Self::Problem => "problem",
            Self::Project => "project",
            Self::ThreadItem => "thread_item",
            Self::ThreadResult => "thread_result",
            Self::Task => "task",
            Self::DoItem => "do_item",
            Self::DontItem => "dont_item",
            Self::StarReport => "star_report",
            Self::RetrospectiveReport => "retrospective_report",
            Self::ActiveSession => "active_session",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// SQL table holding rows of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Persona => "personas",
            Self::Objective => "objectives",
            Self::Gap => "gaps",
            Self::Problem => "problems",
            Self::Project => "projects",
            Self::ThreadItem => "thread_items",
            Self::ThreadResult => "thread_results",
            Self::Task => "tasks",
            Self::DoItem => "do_items",
            Self::DontItem => "dont_items",
            Self::StarReport => "star_reports",
            Self::RetrospectiveReport => "retrospective_reports",
            Self::ActiveSession => "active_session",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical order of a cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// `created_at` descending
    NewestFirst,
    /// `created_at` ascending
    OldestFirst,
    /// Explicit `order` ascending, ties broken by `created_at` ascending
    Explicit,
}

/// A typed record managed by the engine.
///
/// Implementations decide how they map to a stored [`Record`]; plain
/// entities go through serde, thread items dispatch on their variant.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;
    const SORT: SortOrder;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;

    /// Assign identity on creation.
    fn stamp(&mut self, id: String, created_at: DateTime<Utc>);

    fn sort_position(&self) -> Option<i64> {
        None
    }

    fn is_locked(&self) -> bool {
        false
    }

    /// Attribute a new entity to the acting user.
    fn assign_author(&mut self, _author_id: &str) {}

    fn to_record(&self) -> Result<Record, CodecError>;
    fn from_record(record: &Record) -> Result<Self, CodecError>;

    fn collection(cache: &EntityCache) -> &Collection<Self>;
    fn collection_mut(cache: &mut EntityCache) -> &mut Collection<Self>;
}

/// Implements [`Entity`] for a serde-mapped struct with `id` and `created_at`.
macro_rules! serde_entity {
    ($ty:ty, $kind:expr, $sort:expr, $field:ident $(, order = $order:ident)? $(, locked = $locked:ident)?) => {
        impl $crate::models::Entity for $ty {
            const KIND: $crate::models::EntityKind = $kind;
            const SORT: $crate::models::SortOrder = $sort;

            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn stamp(&mut self, id: String, created_at: ::chrono::DateTime<::chrono::Utc>) {
                self.id = id;
                self.created_at = created_at;
            }

            $(
                fn sort_position(&self) -> Option<i64> {
                    Some(self.$order)
                }
            )?

            $(
                fn is_locked(&self) -> bool {
                    self.$locked
                }
            )?

            fn to_record(&self) -> Result<$crate::store::Record, $crate::error::CodecError> {
                $crate::codec::encode(self)
            }

            fn from_record(record: &$crate::store::Record) -> Result<Self, $crate::error::CodecError> {
                $crate::codec::decode(record)
            }

            fn collection(cache: &$crate::cache::EntityCache) -> &$crate::cache::Collection<Self> {
                &cache.$field
            }

            fn collection_mut(
                cache: &mut $crate::cache::EntityCache,
            ) -> &mut $crate::cache::Collection<Self> {
                &mut cache.$field
            }
        }
    };
}

pub(crate) use serde_entity;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
