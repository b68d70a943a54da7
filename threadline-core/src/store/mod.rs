//! Record store adapter.
//!
//! The engine only talks to durable storage through [`RecordStore`]. Rows
//! are untyped JSON objects; [`crate::codec`] turns them into entities.

mod filter;
mod memory;

pub use filter::Filter;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::EntityKind;

/// One stored row: column name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The trait that all storage backends implement.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new row. The record must carry an `id`.
    async fn insert(&self, kind: EntityKind, record: Record) -> Result<(), StoreError>;

    /// Replace the row with the record's `id`. Columns absent from the
    /// record are cleared.
    async fn update(&self, kind: EntityKind, record: Record) -> Result<(), StoreError>;

    /// Delete rows by id. Returns how many rows existed.
    async fn delete(&self, kind: EntityKind, ids: &[String]) -> Result<usize, StoreError>;

    /// Rows matching the filter.
    async fn select(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        (**self).insert(kind, record).await
    }

    async fn update(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        (**self).update(kind, record).await
    }

    async fn delete(&self, kind: EntityKind, ids: &[String]) -> Result<usize, StoreError> {
        (**self).delete(kind, ids).await
    }

    async fn select(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        (**self).select(kind, filter).await
    }
}

pub(crate) fn record_id(kind: EntityKind, record: &Record) -> Result<String, StoreError> {
    record
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Schema {
            kind,
            message: "record has no string `id`".into(),
        })
}
