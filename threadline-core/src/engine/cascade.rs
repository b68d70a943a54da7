use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{EngineError, Result};
use crate::graph::{self, NodeRef};
use crate::models::{Entity, EntityKind};
use crate::store::{record_id, Record, RecordStore};

use super::integrity::Journal;
use super::Engine;

impl<S: RecordStore> Engine<S> {
    /// Every node transitively owned by `root`, root excluded, in
    /// breadth-first order.
    ///
    /// Children are found through the parent's slots and through store rows
    /// pointing back at the parent, so a child missing from a drifted list
    /// is still reached. Revisits are skipped, which also ends cycles.
    pub async fn resolve_descendants(&self, root: &NodeRef, root_record: &Record) -> Result<Vec<NodeRef>> {
        let mut visited: HashSet<NodeRef> = HashSet::from([root.clone()]);
        let mut descendants = Vec::new();
        let mut queue = VecDeque::from([(root.clone(), Some(root_record.clone()))]);

        while let Some((node, record)) = queue.pop_front() {
            let mut found: Vec<(NodeRef, Option<Record>)> = Vec::new();

            for link in graph::links_from(node.kind) {
                let rows = self
                    .store
                    .select(link.child, &link.owned_by(&node.id))
                    .await
                    .map_err(|e| EngineError::store("resolve descendants", e))?;
                for row in rows {
                    match record_id(link.child, &row) {
                        Ok(id) => found.push((NodeRef::new(link.child, id), Some(row))),
                        Err(e) => tracing::warn!("Skipping {} row without id: {}", link.child, e),
                    }
                }
            }
            if let Some(record) = &record {
                found.extend(
                    graph::children_of(node.kind, record)
                        .into_iter()
                        .map(|child| (child, None)),
                );
            }

            for (child, row) in found {
                if !visited.insert(child.clone()) {
                    continue;
                }
                let row = row.or_else(|| {
                    self.cache
                        .record(child.kind, &child.id)
                        .and_then(|r| r.ok())
                });
                descendants.push(child.clone());
                queue.push_back((child, row));
            }
        }

        Ok(descendants)
    }

    /// Delete an entity with everything it owns. Returns the number of
    /// stored rows removed.
    ///
    /// Locked entities may be deleted. The deletion is not transactional: a
    /// store failure partway leaves the kinds already deleted removed from
    /// both store and cache.
    pub async fn delete<T: Entity>(&mut self, id: &str) -> Result<usize> {
        self.delete_node(NodeRef::new(T::KIND, id)).await
    }

    pub async fn delete_node(&mut self, root: NodeRef) -> Result<usize> {
        let Some((root_record, _)) = self.locate(&root).await? else {
            return Err(EngineError::not_found(root.kind, root.id));
        };
        let descendants = self.resolve_descendants(&root, &root_record).await?;

        let mut by_kind: BTreeMap<EntityKind, Vec<String>> = BTreeMap::new();
        for node in &descendants {
            by_kind.entry(node.kind).or_default().push(node.id.clone());
        }

        // Descendants first, the root last.
        let batches = by_kind
            .into_iter()
            .chain(std::iter::once((root.kind, vec![root.id.clone()])));

        let mut removed = 0;
        let mut deleted_threads = HashSet::new();
        let mut failure = None;
        for (kind, ids) in batches {
            match self.store.delete(kind, &ids).await {
                Ok(count) => removed += count,
                Err(e) => {
                    failure = Some(EngineError::store("cascade delete", e));
                    break;
                }
            }
            let ids: HashSet<String> = ids.into_iter().collect();
            self.cache.remove_ids(kind, &ids);
            if kind == EntityKind::ThreadItem {
                deleted_threads.extend(ids);
            }
        }
        self.discard_session_for(&deleted_threads).await;
        if let Some(err) = failure {
            return Err(err);
        }

        let mut journal = Journal::default();
        let mut unlink_failure = None;
        for parent in graph::parents_of(root.kind, &root_record) {
            if let Err(err) = self.unlink(&mut journal, &parent, &root).await {
                unlink_failure = Some(err);
                break;
            }
        }
        self.commit(journal);
        if let Some(err) = unlink_failure {
            return Err(err);
        }

        tracing::debug!(
            "Deleted {} {} and {} descendants ({} rows)",
            root.kind,
            root.id,
            descendants.len(),
            removed
        );
        Ok(removed)
    }
}
