//! Parent-side bookkeeping for child ids.
//!
//! Parent rows are rewritten in the store as links change and recorded in a
//! [`Journal`]. The cache sees them only on [`Engine::commit`]; on failure
//! [`Engine::rollback`] restores the previous rows.

use crate::error::{EngineError, Result};
use crate::graph::{self, NodeRef, ParentRef};
use crate::models::EntityKind;
use crate::store::{Record, RecordStore};

use super::Engine;

struct ParentWrite {
    node: NodeRef,
    before: Record,
    after: Record,
    cached: bool,
}

/// Parent rows written during one operation.
#[derive(Default)]
pub(crate) struct Journal {
    writes: Vec<ParentWrite>,
}

impl Journal {
    fn latest(&self, node: &NodeRef) -> Option<&ParentWrite> {
        self.writes.iter().rev().find(|w| &w.node == node)
    }
}

impl<S: RecordStore> Engine<S> {
    async fn parent_record(&self, journal: &Journal, node: &NodeRef) -> Result<Option<(Record, bool)>> {
        if let Some(write) = journal.latest(node) {
            return Ok(Some((write.after.clone(), write.cached)));
        }
        self.locate(node).await
    }

    /// Add the child to the parent's slot and persist the parent.
    ///
    /// A missing parent is reported as an orphaned reference and skipped.
    /// An exclusive slot already holding another child fails the link.
    pub(crate) async fn link(
        &self,
        journal: &mut Journal,
        parent: &ParentRef,
        child: &NodeRef,
    ) -> Result<()> {
        let node = parent.node();
        let Some((before, cached)) = self.parent_record(journal, &node).await? else {
            let orphan = EngineError::OrphanedReference {
                child_kind: child.kind,
                child_id: child.id.clone(),
                parent_kind: node.kind,
                parent_id: node.id,
            };
            tracing::warn!("{}", orphan);
            return Ok(());
        };

        if let Some(occupant) = parent.link.occupant(&before, &child.id) {
            return Err(EngineError::SlotOccupied {
                parent_kind: node.kind,
                parent_id: node.id,
                field: parent.link.slot.field(),
                occupant,
            });
        }

        let mut after = before.clone();
        if !parent.link.insert(&mut after, &child.id) {
            return Ok(());
        }
        self.store
            .update(node.kind, after.clone())
            .await
            .map_err(|e| EngineError::store("link parent", e))?;
        journal.writes.push(ParentWrite {
            node,
            before,
            after,
            cached,
        });
        Ok(())
    }

    /// Remove the child from the parent's slot and persist the parent.
    pub(crate) async fn unlink(
        &self,
        journal: &mut Journal,
        parent: &ParentRef,
        child: &NodeRef,
    ) -> Result<()> {
        let node = parent.node();
        let Some((before, cached)) = self.parent_record(journal, &node).await? else {
            tracing::debug!("{} {} already gone, nothing to unlink", node.kind, node.id);
            return Ok(());
        };

        let mut after = before.clone();
        if !parent.link.remove(&mut after, &child.id) {
            return Ok(());
        }
        self.store
            .update(node.kind, after.clone())
            .await
            .map_err(|e| EngineError::store("unlink parent", e))?;
        journal.writes.push(ParentWrite {
            node,
            before,
            after,
            cached,
        });
        Ok(())
    }

    /// Move the child between parents after its back-references changed.
    pub(crate) async fn relink(
        &self,
        journal: &mut Journal,
        kind: EntityKind,
        old: &Record,
        new: &Record,
    ) -> Result<()> {
        let Some(id) = new.get("id").and_then(|v| v.as_str()) else {
            return Ok(());
        };
        let child = NodeRef::new(kind, id);
        let old_parents = graph::parents_of(kind, old);
        let new_parents = graph::parents_of(kind, new);

        for parent in old_parents.iter().filter(|p| !new_parents.contains(p)) {
            self.unlink(journal, parent, &child).await?;
        }
        for parent in new_parents.iter().filter(|p| !old_parents.contains(p)) {
            self.link(journal, parent, &child).await?;
        }
        Ok(())
    }

    /// Publish journaled parent rows to the cache.
    pub(crate) fn commit(&mut self, journal: Journal) {
        for write in journal.writes {
            if !write.cached {
                continue;
            }
            if let Err(e) = self.cache.put_record(write.node.kind, &write.after) {
                tracing::warn!(
                    "Could not refresh cached {} {}: {}",
                    write.node.kind,
                    write.node.id,
                    e
                );
            }
        }
    }

    /// Restore journaled parent rows in the store, newest first.
    pub(crate) async fn rollback(&self, journal: Journal) {
        for write in journal.writes.into_iter().rev() {
            if let Err(e) = self.store.update(write.node.kind, write.before).await {
                tracing::error!(
                    "Could not restore {} {} after failed write: {}",
                    write.node.kind,
                    write.node.id,
                    e
                );
            }
        }
    }
}
