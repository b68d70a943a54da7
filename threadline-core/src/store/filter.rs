use serde_json::Value;

use super::Record;

/// Row predicate describing a fetch partition.
///
/// The same filter is compiled to SQL by the SQLite store and evaluated in
/// memory against cached entities, so "rows in the partition" means the same
/// thing on both sides of a merge.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Eq(String, Value),
    IsNull(String),
    IdIn(Vec<String>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Filter::IdIn(vec![id.into()])
    }

    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, other) => Filter::And(vec![f, other]),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => record.get(field).unwrap_or(&Value::Null) == value,
            Filter::IsNull(field) => record.get(field).map_or(true, Value::is_null),
            Filter::IdIn(ids) => record
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| ids.iter().any(|candidate| candidate == id)),
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }

    /// Field names the filter reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Filter::All => Vec::new(),
            Filter::Eq(field, _) | Filter::IsNull(field) => vec![field.as_str()],
            Filter::IdIn(_) => vec!["id"],
            Filter::And(filters) => filters.iter().flat_map(Filter::fields).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_eq_and_null() {
        let row = record(json!({"id": "a", "problem_id": "p1", "parent_id": null}));
        assert!(Filter::eq("problem_id", "p1").matches(&row));
        assert!(!Filter::eq("problem_id", "p2").matches(&row));
        assert!(Filter::is_null("parent_id").matches(&row));
        assert!(Filter::is_null("missing").matches(&row));
        assert!(!Filter::is_null("problem_id").matches(&row));
    }

    #[test]
    fn test_id_in_and_conjunction() {
        let row = record(json!({"id": "a", "problem_id": "p1"}));
        assert!(Filter::IdIn(vec!["b".into(), "a".into()]).matches(&row));
        assert!(!Filter::IdIn(vec![]).matches(&row));

        let both = Filter::eq("problem_id", "p1").and(Filter::id("a"));
        assert!(both.matches(&row));
        assert_eq!(both.fields(), vec!["problem_id", "id"]);
        assert!(!Filter::eq("problem_id", "p1").and(Filter::id("b")).matches(&row));
    }

    #[test]
    fn test_and_with_all_collapses() {
        assert_eq!(Filter::All.and(Filter::id("a")), Filter::id("a"));
    }
}
