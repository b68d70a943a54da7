//! Ownership graph between entity kinds.
//!
//! Every parent -> child relation is declared once in [`LINKS`]. The engine
//! derives parent linking, relinking on update and cascade deletion from
//! this table instead of per-entity list handling.

use serde_json::Value;

use crate::models::EntityKind;
use crate::store::{Filter, Record};

/// Where a parent keeps the ids of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// JSON array of ids
    Many(&'static str),
    /// Single nullable id
    One(&'static str),
}

impl Slot {
    pub fn field(&self) -> &'static str {
        match *self {
            Slot::Many(field) | Slot::One(field) => field,
        }
    }
}

/// One ownership relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent: EntityKind,
    pub slot: Slot,
    pub child: EntityKind,
    /// Child field holding the parent id.
    pub back_ref: &'static str,
    /// The relation only holds while this child field is null.
    pub root_only: Option<&'static str>,
    /// A filled One slot refuses a different child.
    pub exclusive: bool,
}

const fn many(
    parent: EntityKind,
    field: &'static str,
    child: EntityKind,
    back_ref: &'static str,
) -> Link {
    Link {
        parent,
        slot: Slot::Many(field),
        child,
        back_ref,
        root_only: None,
        exclusive: false,
    }
}

const fn one(
    parent: EntityKind,
    field: &'static str,
    child: EntityKind,
    back_ref: &'static str,
) -> Link {
    Link {
        parent,
        slot: Slot::One(field),
        child,
        back_ref,
        root_only: None,
        exclusive: false,
    }
}

const fn exclusive(link: Link) -> Link {
    Link {
        exclusive: true,
        ..link
    }
}

const fn root_only(link: Link, field: &'static str) -> Link {
    Link {
        root_only: Some(field),
        ..link
    }
}

use EntityKind::*;

pub const LINKS: &[Link] = &[
    root_only(many(Persona, "problem_ids", Problem, "persona_id"), "parent_id"),
    many(Objective, "gap_ids", Gap, "objective_id"),
    root_only(many(Objective, "problem_ids", Problem, "objective_id"), "parent_id"),
    root_only(many(Gap, "problem_ids", Problem, "gap_id"), "parent_id"),
    many(Problem, "child_problem_ids", Problem, "parent_id"),
    root_only(many(Problem, "child_thread_ids", ThreadItem, "problem_id"), "parent_id"),
    many(ThreadItem, "child_thread_ids", ThreadItem, "parent_id"),
    many(ThreadItem, "result_ids", ThreadResult, "parent_thread_id"),
    exclusive(one(Problem, "project_id", Project, "problem_id")),
    exclusive(one(Objective, "project_id", Project, "objective_id")),
    one(Problem, "star_report_id", StarReport, "problem_id"),
    one(Objective, "star_report_id", StarReport, "objective_id"),
    one(Problem, "retrospective_report_id", RetrospectiveReport, "problem_id"),
    one(Objective, "retrospective_report_id", RetrospectiveReport, "objective_id"),
    many(Project, "task_ids", Task, "project_id"),
    many(Project, "do_item_ids", DoItem, "project_id"),
    many(Project, "dont_item_ids", DontItem, "project_id"),
];

/// An entity identified by kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub kind: EntityKind,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// A parent a record points at, with the relation that connects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub link: &'static Link,
    pub id: String,
}

impl ParentRef {
    pub fn node(&self) -> NodeRef {
        NodeRef::new(self.link.parent, self.id.clone())
    }
}

impl Link {
    /// Store predicate for the rows this relation assigns to `parent_id`.
    ///
    /// Nested rows are left out for `root_only` relations. Their back-ref is
    /// not rewritten when an ancestor moves, so only their own parent owns
    /// them.
    pub fn owned_by(&self, parent_id: &str) -> Filter {
        let filter = Filter::eq(self.back_ref, parent_id);
        match self.root_only {
            Some(field) => filter.and(Filter::is_null(field)),
            None => filter,
        }
    }

    /// Child already holding an exclusive slot, if it is not `child_id`.
    pub fn occupant(&self, parent: &Record, child_id: &str) -> Option<String> {
        if !self.exclusive {
            return None;
        }
        self.slot_ids(parent).into_iter().find(|id| id != child_id)
    }

    /// Ids held in the parent's slot.
    pub fn slot_ids(&self, parent: &Record) -> Vec<String> {
        match (self.slot, parent.get(self.slot.field())) {
            (Slot::Many(_), Some(Value::Array(ids))) => ids
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            (Slot::One(_), Some(Value::String(id))) => vec![id.clone()],
            _ => Vec::new(),
        }
    }

    /// Record `child_id` in the parent's slot. Returns whether the record
    /// changed; linking an already linked id is a no-op.
    pub fn insert(&self, parent: &mut Record, child_id: &str) -> bool {
        match self.slot {
            Slot::Many(field) => {
                let entry = parent
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                let Value::Array(ids) = entry else {
                    return false;
                };
                if ids.iter().any(|id| id.as_str() == Some(child_id)) {
                    return false;
                }
                ids.push(Value::String(child_id.to_string()));
                true
            }
            Slot::One(field) => {
                if parent.get(field).and_then(Value::as_str) == Some(child_id) {
                    return false;
                }
                parent.insert(field.to_string(), Value::String(child_id.to_string()));
                true
            }
        }
    }

    /// Remove `child_id` from the parent's slot. Returns whether the record
    /// changed; unlinking an absent id is a no-op.
    pub fn remove(&self, parent: &mut Record, child_id: &str) -> bool {
        match self.slot {
            Slot::Many(field) => {
                let Some(Value::Array(ids)) = parent.get_mut(field) else {
                    return false;
                };
                let before = ids.len();
                ids.retain(|id| id.as_str() != Some(child_id));
                ids.len() != before
            }
            Slot::One(field) => {
                if parent.get(field).and_then(Value::as_str) != Some(child_id) {
                    return false;
                }
                parent.insert(field.to_string(), Value::Null);
                true
            }
        }
    }
}

/// Relations where `kind` is the child.
pub fn links_to(kind: EntityKind) -> impl Iterator<Item = &'static Link> {
    LINKS.iter().filter(move |link| link.child == kind)
}

/// Relations where `kind` is the parent.
pub fn links_from(kind: EntityKind) -> impl Iterator<Item = &'static Link> {
    LINKS.iter().filter(move |link| link.parent == kind)
}

/// Parents the child record currently points at.
pub fn parents_of(kind: EntityKind, child: &Record) -> Vec<ParentRef> {
    links_to(kind)
        .filter(|link| {
            link.root_only
                .map_or(true, |field| child.get(field).map_or(true, Value::is_null))
        })
        .filter_map(|link| {
            child
                .get(link.back_ref)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(|id| ParentRef {
                    link,
                    id: id.to_string(),
                })
        })
        .collect()
}

/// Children listed in the parent's slots.
pub fn children_of(kind: EntityKind, parent: &Record) -> Vec<NodeRef> {
    links_from(kind)
        .flat_map(|link| {
            link.slot_ids(parent)
                .into_iter()
                .map(move |id| NodeRef::new(link.child, id))
        })
        .collect()
}

/// Slot fields of `kind`. These are owned by the integrity maintainer and
/// never taken from caller input on update.
pub fn slot_fields(kind: EntityKind) -> impl Iterator<Item = &'static str> {
    links_from(kind).map(|link| link.slot.field())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn link(parent: EntityKind, field: &str) -> &'static Link {
        links_from(parent)
            .find(|l| l.slot.field() == field)
            .unwrap()
    }

    #[test]
    fn test_root_thread_item_belongs_to_problem() {
        let root = record(json!({"id": "t1", "problem_id": "p1", "parent_id": null}));
        let parents = parents_of(ThreadItem, &root);
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].node(), NodeRef::new(Problem, "p1"));
    }

    #[test]
    fn test_nested_thread_item_belongs_to_parent_item() {
        let nested = record(json!({"id": "t2", "problem_id": "p1", "parent_id": "t1"}));
        let parents = parents_of(ThreadItem, &nested);
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].node(), NodeRef::new(ThreadItem, "t1"));
    }

    #[test]
    fn test_nested_problem_skips_persona() {
        let nested = record(json!({"id": "c", "persona_id": "x", "parent_id": "p"}));
        let kinds: Vec<EntityKind> = parents_of(Problem, &nested)
            .iter()
            .map(|p| p.link.parent)
            .collect();
        assert_eq!(kinds, vec![Problem]);
    }

    #[test]
    fn test_many_slot_is_idempotent() {
        let slot = link(Problem, "child_thread_ids");
        let mut parent = record(json!({"id": "p1"}));
        assert!(slot.insert(&mut parent, "t1"));
        assert!(!slot.insert(&mut parent, "t1"));
        assert_eq!(slot.slot_ids(&parent), vec!["t1".to_string()]);
        assert!(slot.remove(&mut parent, "t1"));
        assert!(!slot.remove(&mut parent, "t1"));
        assert!(slot.slot_ids(&parent).is_empty());
    }

    #[test]
    fn test_one_slot_only_clears_its_own_child() {
        let slot = link(Problem, "project_id");
        let mut parent = record(json!({"id": "p1", "project_id": null}));
        assert!(slot.insert(&mut parent, "pr1"));
        assert!(!slot.remove(&mut parent, "other"));
        assert_eq!(parent["project_id"], json!("pr1"));
        assert!(slot.remove(&mut parent, "pr1"));
        assert_eq!(parent["project_id"], Value::Null);
    }

    #[test]
    fn test_project_slot_refuses_second_child() {
        let slot = link(Problem, "project_id");
        let parent = record(json!({"id": "p1", "project_id": "pr1"}));
        assert_eq!(slot.occupant(&parent, "pr2"), Some("pr1".to_string()));
        assert_eq!(slot.occupant(&parent, "pr1"), None);

        let empty = record(json!({"id": "p1", "project_id": null}));
        assert_eq!(slot.occupant(&empty, "pr2"), None);

        let report = link(Problem, "star_report_id");
        let parent = record(json!({"id": "p1", "star_report_id": "s1"}));
        assert_eq!(report.occupant(&parent, "s2"), None);
    }

    #[test]
    fn test_owned_by_skips_nested_rows_for_root_relations() {
        let roots = link(Problem, "child_thread_ids").owned_by("p1");
        assert!(roots.matches(&record(json!({"id": "t1", "problem_id": "p1", "parent_id": null}))));
        assert!(!roots.matches(&record(json!({"id": "t2", "problem_id": "p1", "parent_id": "t1"}))));

        let replies = link(ThreadItem, "child_thread_ids").owned_by("t1");
        assert_eq!(replies, Filter::eq("parent_id", "t1"));
    }

    #[test]
    fn test_children_cross_relations() {
        let problem = record(json!({
            "id": "p1",
            "child_problem_ids": ["p2"],
            "child_thread_ids": ["t1", "t2"],
            "project_id": "pr1",
            "star_report_id": null,
        }));
        let children = children_of(Problem, &problem);
        assert_eq!(children.len(), 4);
        assert!(children.contains(&NodeRef::new(Project, "pr1")));
        assert!(children.contains(&NodeRef::new(Problem, "p2")));
    }

    #[test]
    fn test_every_link_names_distinct_slot() {
        for kind in EntityKind::ALL {
            let mut fields: Vec<&str> = slot_fields(kind).collect();
            let count = fields.len();
            fields.sort();
            fields.dedup();
            assert_eq!(fields.len(), count, "{} repeats a slot", kind);
        }
    }
}
