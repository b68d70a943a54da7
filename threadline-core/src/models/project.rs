use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

/// A plan of action owned by exactly one problem or objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub problem_id: Option<String>,
    pub objective_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub do_item_ids: Vec<String>,
    #[serde(default)]
    pub dont_item_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn for_problem(problem_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            problem_id: Some(problem_id.into()),
            ..Self::untitled(title)
        }
    }

    pub fn for_objective(objective_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            objective_id: Some(objective_id.into()),
            ..Self::untitled(title)
        }
    }

    fn untitled(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            problem_id: None,
            objective_id: None,
            title: title.into(),
            description: None,
            task_ids: Vec::new(),
            do_item_ids: Vec::new(),
            dont_item_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

serde_entity!(Project, EntityKind::Project, SortOrder::NewestFirst, projects);
