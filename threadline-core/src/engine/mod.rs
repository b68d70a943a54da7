//! The entity graph engine.
//!
//! [`Engine`] owns the cache and the session timer and is the only writer
//! of both. Every operation writes the record store first and touches the
//! cache only once all store writes of the operation have succeeded.

mod cascade;
mod domain;
mod fetch;
mod integrity;
mod mutate;
mod timer;

use std::sync::Arc;

use tokio::sync::watch;

use crate::cache::{Collection, EntityCache};
use crate::error::{EngineError, Result};
use crate::graph::NodeRef;
use crate::models::Entity;
use crate::session::{Clock, SessionTimer, SystemClock};
use crate::store::{Filter, Record, RecordStore};

pub struct Engine<S: RecordStore> {
    store: S,
    cache: EntityCache,
    timer: SessionTimer,
    session_tx: watch::Sender<SessionTimer>,
    clock: Arc<dyn Clock>,
    author_id: String,
}

impl<S: RecordStore> Engine<S> {
    pub fn new(store: S) -> Self {
        let (session_tx, _) = watch::channel(SessionTimer::Idle);
        Self {
            store,
            cache: EntityCache::default(),
            timer: SessionTimer::Idle,
            session_tx,
            clock: Arc::new(SystemClock),
            author_id: String::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = author_id.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    /// Synchronous cache read.
    pub fn get<T: Entity>(&self, id: &str) -> Option<&T> {
        self.cache.get(id)
    }

    pub fn all<T: Entity>(&self) -> &Collection<T> {
        self.cache.all()
    }

    /// Current record of a node, from the cache or else the store, and
    /// whether it came from the cache.
    pub(crate) async fn locate(&self, node: &NodeRef) -> Result<Option<(Record, bool)>> {
        if let Some(found) = self.cache.record(node.kind, &node.id) {
            let record = found.map_err(|e| EngineError::codec(node.kind, e))?;
            return Ok(Some((record, true)));
        }
        let rows = self
            .store
            .select(node.kind, &Filter::id(node.id.clone()))
            .await
            .map_err(|e| EngineError::store("lookup", e))?;
        Ok(rows.into_iter().next().map(|row| (row, false)))
    }
}
