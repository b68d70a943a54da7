use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

/// A problem the user works on. Problems nest through `parent_id`; root
/// problems hang off a persona, an objective or a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub persona_id: Option<String>,
    pub objective_id: Option<String>,
    pub gap_id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_problem_ids: Vec<String>,
    #[serde(default)]
    pub child_thread_ids: Vec<String>,
    pub project_id: Option<String>,
    pub retrospective_report_id: Option<String>,
    pub star_report_id: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Problem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: None,
            persona_id: None,
            objective_id: None,
            gap_id: None,
            parent_id: None,
            child_problem_ids: Vec::new(),
            child_thread_ids: Vec::new(),
            project_id: None,
            retrospective_report_id: None,
            star_report_id: None,
            is_resolved: false,
            created_at: Utc::now(),
        }
    }

    pub fn under_persona(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    pub fn under_objective(mut self, objective_id: impl Into<String>) -> Self {
        self.objective_id = Some(objective_id.into());
        self
    }

    pub fn under_gap(mut self, gap_id: impl Into<String>) -> Self {
        self.gap_id = Some(gap_id.into());
        self
    }

    pub fn under_problem(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

serde_entity!(Problem, EntityKind::Problem, SortOrder::NewestFirst, problems);
