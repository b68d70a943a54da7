//! In-memory entity cache, one ordered collection per entity type.
//!
//! Consumers read from here; only the engine writes.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::CodecError;
use crate::models::*;
use crate::store::Record;

/// Entities of one kind, kept in canonical order with an id index.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Outcome of merging one fetched partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    pub fetched: usize,
    pub dropped: usize,
}

impl<T: Entity> Collection<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn upsert(&mut self, entity: T) {
        match self.index.get(entity.id()) {
            Some(&i) => self.items[i] = entity,
            None => self.items.push(entity),
        }
        self.resort();
    }

    pub fn remove_ids(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.items.len();
        self.items.retain(|e| !ids.contains(e.id()));
        let removed = before - self.items.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    /// Replace every cached entity inside the partition with `fetched`.
    ///
    /// Entities outside the partition are kept unless a fetched row with the
    /// same id supersedes them.
    pub fn merge_partition<F>(&mut self, in_partition: F, fetched: Vec<T>) -> MergeStats
    where
        F: Fn(&T) -> bool,
    {
        let fetched_ids: HashSet<String> = fetched.iter().map(|e| e.id().to_string()).collect();
        let mut dropped = 0;
        self.items.retain(|e| {
            let superseded = fetched_ids.contains(e.id());
            let keep = !superseded && !in_partition(e);
            // Rows re-delivered by the fetch are not counted as dropped.
            if !keep && !superseded {
                dropped += 1;
            }
            keep
        });
        let stats = MergeStats {
            fetched: fetched.len(),
            dropped,
        };
        self.items.extend(fetched);
        self.resort();
        stats
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    fn resort(&mut self) {
        self.items.sort_by(compare::<T>);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id().to_string(), i))
            .collect();
    }
}

fn compare<T: Entity>(a: &T, b: &T) -> Ordering {
    let by_created = a.created_at().cmp(&b.created_at());
    let primary = match T::SORT {
        SortOrder::NewestFirst => by_created.reverse(),
        SortOrder::OldestFirst => by_created,
        SortOrder::Explicit => a
            .sort_position()
            .unwrap_or(i64::MAX)
            .cmp(&b.sort_position().unwrap_or(i64::MAX))
            .then(by_created),
    };
    primary.then_with(|| a.id().cmp(b.id()))
}

/// The shared cache read by consumers.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    pub users: Collection<User>,
    pub personas: Collection<Persona>,
    pub objectives: Collection<Objective>,
    pub gaps: Collection<Gap>,
    pub problems: Collection<Problem>,
    pub projects: Collection<Project>,
    pub thread_items: Collection<ThreadItem>,
    pub results: Collection<ThreadResult>,
    pub tasks: Collection<Task>,
    pub do_items: Collection<DoItem>,
    pub dont_items: Collection<DontItem>,
    pub star_reports: Collection<StarReport>,
    pub retrospective_reports: Collection<RetrospectiveReport>,
}

/// Run `$body` with `$coll` bound to the collection for `$kind`.
macro_rules! with_collection {
    ([$($borrow:tt)+] $cache:expr, $kind:expr, $coll:ident => $body:expr, otherwise $default:expr) => {
        match $kind {
            EntityKind::User => { let $coll = $($borrow)+ $cache.users; $body }
            EntityKind::Persona => { let $coll = $($borrow)+ $cache.personas; $body }
            EntityKind::Objective => { let $coll = $($borrow)+ $cache.objectives; $body }
            EntityKind::Gap => { let $coll = $($borrow)+ $cache.gaps; $body }
            EntityKind::Problem => { let $coll = $($borrow)+ $cache.problems; $body }
            EntityKind::Project => { let $coll = $($borrow)+ $cache.projects; $body }
            EntityKind::ThreadItem => { let $coll = $($borrow)+ $cache.thread_items; $body }
            EntityKind::ThreadResult => { let $coll = $($borrow)+ $cache.results; $body }
            EntityKind::Task => { let $coll = $($borrow)+ $cache.tasks; $body }
            EntityKind::DoItem => { let $coll = $($borrow)+ $cache.do_items; $body }
            EntityKind::DontItem => { let $coll = $($borrow)+ $cache.dont_items; $body }
            EntityKind::StarReport => { let $coll = $($borrow)+ $cache.star_reports; $body }
            EntityKind::RetrospectiveReport => {
                let $coll = $($borrow)+ $cache.retrospective_reports;
                $body
            }
            EntityKind::ActiveSession => $default,
        }
    };
}

fn record_in<T: Entity>(coll: &Collection<T>, id: &str) -> Option<Result<Record, CodecError>> {
    coll.get(id).map(Entity::to_record)
}

fn put_record<T: Entity>(coll: &mut Collection<T>, record: &Record) -> Result<(), CodecError> {
    coll.upsert(T::from_record(record)?);
    Ok(())
}

impl EntityCache {
    pub fn get<T: Entity>(&self, id: &str) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn all<T: Entity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    /// Serialized form of a cached entity of any kind.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<Result<Record, CodecError>> {
        with_collection!([&] self, kind, coll => record_in(coll, id), otherwise None)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        with_collection!([&] self, kind, coll => coll.contains(id), otherwise false)
    }

    /// Parse and upsert a record of any kind.
    pub fn put_record(&mut self, kind: EntityKind, record: &Record) -> Result<(), CodecError> {
        with_collection!([&mut] self, kind, coll => put_record(coll, record), otherwise Ok(()))
    }

    pub fn remove_ids(&mut self, kind: EntityKind, ids: &HashSet<String>) -> usize {
        with_collection!([&mut] self, kind, coll => coll.remove_ids(ids), otherwise 0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn problem(id: &str, persona: &str, minutes: i64) -> Problem {
        let mut p = Problem::new(id).under_persona(persona);
        p.id = id.into();
        p.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        p
    }

    #[test]
    fn test_problems_sort_newest_first() {
        let mut coll = Collection::default();
        coll.upsert(problem("old", "a", 0));
        coll.upsert(problem("new", "a", 10));
        coll.upsert(problem("mid", "a", 5));
        let ids: Vec<&str> = coll.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(coll.get("mid").unwrap().id, "mid");
    }

    #[test]
    fn test_personas_sort_by_explicit_order() {
        let mut coll = Collection::default();
        let mut first = Persona::new("u", "first").with_order(2);
        first.id = "first".into();
        let mut second = Persona::new("u", "second").with_order(1);
        second.id = "second".into();
        coll.upsert(first);
        coll.upsert(second);
        let ids: Vec<&str> = coll.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[test]
    fn test_merge_replaces_only_the_partition() {
        let mut coll = Collection::default();
        coll.upsert(problem("a1", "a", 0));
        coll.upsert(problem("a2", "a", 1));
        coll.upsert(problem("b1", "b", 2));

        // a2 was deleted elsewhere; a3 is new.
        let stats = coll.merge_partition(
            |p: &Problem| p.persona_id.as_deref() == Some("a"),
            vec![problem("a1", "a", 0), problem("a3", "a", 3)],
        );

        assert_eq!(stats.fetched, 2);
        assert!(coll.contains("b1"));
        assert!(coll.contains("a1"));
        assert!(coll.contains("a3"));
        assert!(!coll.contains("a2"));
        assert_eq!(coll.len(), 3);
    }

    #[test]
    fn test_merge_supersedes_rows_moved_out_of_partition() {
        let mut coll = Collection::default();
        coll.upsert(problem("x", "b", 0));
        coll.merge_partition(
            |p: &Problem| p.persona_id.as_deref() == Some("a"),
            vec![problem("x", "a", 0)],
        );
        assert_eq!(coll.len(), 1);
        assert_eq!(coll.get("x").unwrap().persona_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_dynamic_record_access() {
        let mut cache = EntityCache::default();
        let p = problem("p1", "a", 0);
        let record = p.to_record().unwrap();
        cache.put_record(EntityKind::Problem, &record).unwrap();
        assert!(cache.contains(EntityKind::Problem, "p1"));
        assert_eq!(cache.record(EntityKind::Problem, "p1").unwrap().unwrap(), record);
        assert!(cache.record(EntityKind::ActiveSession, "p1").is_none());

        let ids: HashSet<String> = ["p1".to_string()].into();
        assert_eq!(cache.remove_ids(EntityKind::Problem, &ids), 1);
        assert!(cache.get::<Problem>("p1").is_none());
    }
}
