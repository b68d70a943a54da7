use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, serde_entity, EntityKind, SortOrder};

/// The single local user. Owns personas and objectives through queries only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

serde_entity!(User, EntityKind::User, SortOrder::OldestFirst, users);

/// A role the user plays, grouping the problems they face in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub problem_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            order: 0,
            problem_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

serde_entity!(Persona, EntityKind::Persona, SortOrder::Explicit, personas, order = order);

/// A goal, either holding problems directly or structured through gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub gap_ids: Vec<String>,
    #[serde(default)]
    pub problem_ids: Vec<String>,
    pub project_id: Option<String>,
    pub star_report_id: Option<String>,
    pub retrospective_report_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Objective {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            order: 0,
            gap_ids: Vec::new(),
            problem_ids: Vec::new(),
            project_id: None,
            star_report_id: None,
            retrospective_report_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

serde_entity!(Objective, EntityKind::Objective, SortOrder::Explicit, objectives, order = order);

/// Ideal-versus-current state record under an objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: String,
    pub objective_id: String,
    pub ideal_state: String,
    pub current_state: String,
    #[serde(default)]
    pub problem_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Gap {
    pub fn new(
        objective_id: impl Into<String>,
        ideal_state: impl Into<String>,
        current_state: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            objective_id: objective_id.into(),
            ideal_state: ideal_state.into(),
            current_state: current_state.into(),
            problem_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

serde_entity!(Gap, EntityKind::Gap, SortOrder::OldestFirst, gaps);
