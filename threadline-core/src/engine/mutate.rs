use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::graph::{self, NodeRef};
use crate::models::{new_id, Entity, EntityKind};
use crate::store::{Record, RecordStore};

use super::integrity::Journal;
use super::Engine;

/// Fields the caller never controls on update.
const IDENTITY_FIELDS: [&str; 2] = ["id", "created_at"];

/// Empty every child slot of a record.
fn clear_slots(kind: EntityKind, record: &mut Record) {
    for link in graph::links_from(kind) {
        let empty = match link.slot {
            graph::Slot::Many(_) => Value::Array(Vec::new()),
            graph::Slot::One(_) => Value::Null,
        };
        record.insert(link.slot.field().to_string(), empty);
    }
}

/// Copy identity and child slots from the cached record into `next`.
fn keep_owned_fields(kind: EntityKind, current: &Record, next: &mut Record) {
    for field in IDENTITY_FIELDS.into_iter().chain(graph::slot_fields(kind)) {
        match current.get(field) {
            Some(value) => next.insert(field.to_string(), value.clone()),
            None => next.remove(field),
        };
    }
}

impl<S: RecordStore> Engine<S> {
    /// Create an entity: assign id and creation time, write it, then add it
    /// to its parents' child lists.
    ///
    /// If a parent write fails the new row is deleted again, parents already
    /// written are restored and the cache is left untouched.
    pub async fn add<T: Entity>(&mut self, mut entity: T) -> Result<T> {
        entity.stamp(new_id(), self.clock.now());
        entity.assign_author(&self.author_id);

        let mut record = entity.to_record().map_err(|e| EngineError::codec(T::KIND, e))?;
        clear_slots(T::KIND, &mut record);
        let entity = T::from_record(&record).map_err(|e| EngineError::codec(T::KIND, e))?;

        self.store
            .insert(T::KIND, record.clone())
            .await
            .map_err(|e| EngineError::store("add", e))?;

        let child = NodeRef::new(T::KIND, entity.id());
        let mut journal = Journal::default();
        for parent in graph::parents_of(T::KIND, &record) {
            if let Err(err) = self.link(&mut journal, &parent, &child).await {
                self.rollback(journal).await;
                self.discard_insert(&child).await;
                return Err(err);
            }
        }

        self.commit(journal);
        T::collection_mut(&mut self.cache).upsert(entity.clone());
        tracing::debug!("Added {} {}", T::KIND, entity.id());
        Ok(entity)
    }

    async fn discard_insert(&self, node: &NodeRef) {
        if let Err(e) = self
            .store
            .delete(node.kind, std::slice::from_ref(&node.id))
            .await
        {
            tracing::error!("Could not remove {} {} after failed add: {}", node.kind, node.id, e);
        }
    }

    fn current_record<T: Entity>(&self, id: &str) -> Result<Record> {
        let current = self
            .cache
            .get::<T>(id)
            .ok_or_else(|| EngineError::not_found(T::KIND, id))?;
        if current.is_locked() {
            return Err(EngineError::Locked {
                kind: T::KIND,
                id: id.to_string(),
            });
        }
        current.to_record().map_err(|e| EngineError::codec(T::KIND, e))
    }

    /// Replace an entity with a new version.
    ///
    /// The entity must be cached. Identity and child lists are taken from
    /// the cached record; parent pointers that changed move the entity
    /// between parents.
    pub async fn update<T: Entity>(&mut self, entity: T) -> Result<T> {
        let current = self.current_record::<T>(entity.id())?;
        let mut next = entity.to_record().map_err(|e| EngineError::codec(T::KIND, e))?;
        keep_owned_fields(T::KIND, &current, &mut next);
        self.write_update::<T>(current, next).await
    }

    /// Read-modify-write against the latest cached value.
    pub async fn update_with<T, F>(&mut self, id: &str, change: F) -> Result<T>
    where
        T: Entity,
        F: FnOnce(&mut T),
    {
        let mut entity = self
            .cache
            .get::<T>(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(T::KIND, id))?;
        change(&mut entity);
        self.update(entity).await
    }

    /// Merge the given fields into the cached record.
    pub async fn patch<T: Entity>(&mut self, id: &str, fields: Record) -> Result<T> {
        let current = self.current_record::<T>(id)?;
        let mut next = current.clone();
        next.extend(fields);
        keep_owned_fields(T::KIND, &current, &mut next);
        self.write_update::<T>(current, next).await
    }

    /// Lock or unlock an entity. This is the one mutation locked entities
    /// accept.
    pub async fn set_locked<T: Entity>(&mut self, id: &str, locked: bool) -> Result<T> {
        let current = self
            .cache
            .get::<T>(id)
            .ok_or_else(|| EngineError::not_found(T::KIND, id))?
            .to_record()
            .map_err(|e| EngineError::codec(T::KIND, e))?;
        let mut next = current.clone();
        next.insert("is_locked".to_string(), Value::Bool(locked));
        self.write_update::<T>(current, next).await
    }

    async fn write_update<T: Entity>(&mut self, current: Record, next: Record) -> Result<T> {
        let entity = T::from_record(&next).map_err(|e| EngineError::codec(T::KIND, e))?;
        let next = entity.to_record().map_err(|e| EngineError::codec(T::KIND, e))?;

        self.store
            .update(T::KIND, next.clone())
            .await
            .map_err(|e| EngineError::store("update", e))?;

        let mut journal = Journal::default();
        if let Err(err) = self.relink(&mut journal, T::KIND, &current, &next).await {
            self.rollback(journal).await;
            if let Err(e) = self.store.update(T::KIND, current).await {
                tracing::error!("Could not restore {} {}: {}", T::KIND, entity.id(), e);
            }
            return Err(err);
        }

        self.commit(journal);
        T::collection_mut(&mut self.cache).upsert(entity.clone());
        tracing::debug!("Updated {} {}", T::KIND, entity.id());
        Ok(entity)
    }
}
