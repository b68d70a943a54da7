use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

/// Situation / Task / Action / Result write-up for a problem or objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarReport {
    pub id: String,
    pub problem_id: Option<String>,
    pub objective_id: Option<String>,
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub result: String,
    pub created_at: DateTime<Utc>,
}

impl StarReport {
    pub fn for_problem(problem_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            problem_id: Some(problem_id.into()),
            objective_id: None,
            situation: String::new(),
            task: String::new(),
            action: String::new(),
            result: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_objective(objective_id: impl Into<String>) -> Self {
        Self {
            problem_id: None,
            objective_id: Some(objective_id.into()),
            ..Self::for_problem("")
        }
    }
}

serde_entity!(StarReport, EntityKind::StarReport, SortOrder::NewestFirst, star_reports);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrospectiveReport {
    pub id: String,
    pub problem_id: Option<String>,
    pub objective_id: Option<String>,
    #[serde(default)]
    pub went_well: String,
    #[serde(default)]
    pub to_improve: String,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl RetrospectiveReport {
    pub fn for_problem(problem_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            problem_id: Some(problem_id.into()),
            objective_id: None,
            went_well: String::new(),
            to_improve: String::new(),
            action_items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_objective(objective_id: impl Into<String>) -> Self {
        Self {
            problem_id: None,
            objective_id: Some(objective_id.into()),
            ..Self::for_problem("")
        }
    }
}

serde_entity!(
    RetrospectiveReport,
    EntityKind::RetrospectiveReport,
    SortOrder::NewestFirst,
    retrospective_reports
);
