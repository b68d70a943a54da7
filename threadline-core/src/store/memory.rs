use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{record_id, Filter, Record, RecordStore};
use crate::error::StoreError;
use crate::models::EntityKind;

const NO_LIMIT: usize = usize::MAX;

/// Volatile store backed by ordered maps. Used by tests and for scratch
/// sessions; supports failing writes on demand.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<EntityKind, BTreeMap<String, Record>>>,
    writes_left: AtomicUsize,
    failing_kinds: Mutex<HashSet<EntityKind>>,
    armed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more writes succeed, then fail the next one.
    pub fn fail_write_after(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Fail every write that touches `kind`.
    pub fn fail_writes_for(&self, kind: EntityKind) {
        if let Ok(mut kinds) = self.failing_kinds.lock() {
            kinds.insert(kind);
        }
    }

    pub fn heal(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.writes_left.store(NO_LIMIT, Ordering::SeqCst);
        if let Ok(mut kinds) = self.failing_kinds.lock() {
            kinds.clear();
        }
    }

    /// Every stored row of a kind, ordered by id.
    pub async fn rows(&self, kind: EntityKind) -> Vec<Record> {
        self.tables
            .read()
            .await
            .get(&kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_write(&self, kind: EntityKind, op: &str) -> Result<(), StoreError> {
        let kind_fails = self
            .failing_kinds
            .lock()
            .map(|kinds| kinds.contains(&kind))
            .unwrap_or(false);
        if kind_fails {
            return Err(StoreError::Injected(format!("{} on {}", op, kind)));
        }

        if self.armed.load(Ordering::SeqCst) {
            let exhausted = self
                .writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_err();
            if exhausted {
                self.armed.store(false, Ordering::SeqCst);
                return Err(StoreError::Injected(format!("{} on {}", op, kind)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        self.check_write(kind, "insert")?;
        let id = record_id(kind, &record)?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(kind).or_default();
        if table.contains_key(&id) {
            return Err(StoreError::Backend(format!("duplicate {} id {}", kind, id)));
        }
        table.insert(id, record);
        Ok(())
    }

    async fn update(&self, kind: EntityKind, record: Record) -> Result<(), StoreError> {
        self.check_write(kind, "update")?;
        let id = record_id(kind, &record)?;
        let mut tables = self.tables.write().await;
        match tables.get_mut(&kind).and_then(|table| table.get_mut(&id)) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(StoreError::NotFound { kind, id }),
        }
    }

    async fn delete(&self, kind: EntityKind, ids: &[String]) -> Result<usize, StoreError> {
        self.check_write(kind, "delete")?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&kind) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| table.remove(*id).is_some()).count())
    }

    async fn select(&self, kind: EntityKind, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .map(|table| {
                table
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
