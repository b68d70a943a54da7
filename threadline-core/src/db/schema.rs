use crate::models::EntityKind;

// Foreign keys are declared for documentation only; `PRAGMA foreign_keys`
// stays off because the engine owns referential integrity and cascades.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS personas (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    description TEXT,
    "order" INTEGER NOT NULL DEFAULT 0,
    problem_ids JSON,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS objectives (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    description TEXT,
    "order" INTEGER NOT NULL DEFAULT 0,
    gap_ids JSON,
    problem_ids JSON,
    project_id TEXT,
    star_report_id TEXT,
    retrospective_report_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS gaps (
    id TEXT PRIMARY KEY,
    objective_id TEXT NOT NULL REFERENCES objectives(id),
    ideal_state TEXT NOT NULL,
    current_state TEXT NOT NULL,
    problem_ids JSON,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS problems (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    persona_id TEXT REFERENCES personas(id),
    objective_id TEXT REFERENCES objectives(id),
    gap_id TEXT REFERENCES gaps(id),
    parent_id TEXT REFERENCES problems(id),
    child_problem_ids JSON,
    child_thread_ids JSON,
    project_id TEXT,
    retrospective_report_id TEXT,
    star_report_id TEXT,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    problem_id TEXT REFERENCES problems(id),
    objective_id TEXT REFERENCES objectives(id),
    title TEXT NOT NULL,
    description TEXT,
    task_ids JSON,
    do_item_ids JSON,
    dont_item_ids JSON,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS thread_items (
    id TEXT PRIMARY KEY,
    problem_id TEXT NOT NULL REFERENCES problems(id),
    parent_id TEXT REFERENCES thread_items(id),
    child_thread_ids JSON,
    type TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    is_important INTEGER NOT NULL DEFAULT 0,
    result_ids JSON,
    author_id TEXT,
    created_at TEXT NOT NULL,
    is_resolved INTEGER,
    is_completed INTEGER,
    status TEXT CHECK (status IS NULL OR status IN ('todo', 'inProgress', 'completed', 'cancelled')),
    time_spent INTEGER,
    deadline TEXT,
    completed_at TEXT,
    start_time TEXT
);

CREATE TABLE IF NOT EXISTS thread_results (
    id TEXT PRIMARY KEY,
    parent_thread_id TEXT NOT NULL REFERENCES thread_items(id),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed')),
    is_locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS do_items (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    title TEXT NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    is_locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dont_items (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id),
    title TEXT NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    is_locked INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS star_reports (
    id TEXT PRIMARY KEY,
    problem_id TEXT REFERENCES problems(id),
    objective_id TEXT REFERENCES objectives(id),
    situation TEXT NOT NULL DEFAULT '',
    task TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL DEFAULT '',
    result TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS retrospective_reports (
    id TEXT PRIMARY KEY,
    problem_id TEXT REFERENCES problems(id),
    objective_id TEXT REFERENCES objectives(id),
    went_well TEXT NOT NULL DEFAULT '',
    to_improve TEXT NOT NULL DEFAULT '',
    action_items JSON,
    created_at TEXT NOT NULL
);

-- Singleton row (id = 'active') for the running or paused session timer
CREATE TABLE IF NOT EXISTS active_session (
    id TEXT PRIMARY KEY CHECK (id = 'active'),
    thread_id TEXT NOT NULL REFERENCES thread_items(id),
    start_time TEXT NOT NULL,
    is_paused INTEGER NOT NULL DEFAULT 0,
    paused_time INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_personas_user ON personas(user_id);
CREATE INDEX IF NOT EXISTS idx_objectives_user ON objectives(user_id);
CREATE INDEX IF NOT EXISTS idx_gaps_objective ON gaps(objective_id);
CREATE INDEX IF NOT EXISTS idx_problems_persona ON problems(persona_id);
CREATE INDEX IF NOT EXISTS idx_problems_objective ON problems(objective_id);
CREATE INDEX IF NOT EXISTS idx_problems_gap ON problems(gap_id);
CREATE INDEX IF NOT EXISTS idx_problems_parent ON problems(parent_id);
CREATE INDEX IF NOT EXISTS idx_projects_problem ON projects(problem_id);
CREATE INDEX IF NOT EXISTS idx_thread_items_problem ON thread_items(problem_id);
CREATE INDEX IF NOT EXISTS idx_thread_items_parent ON thread_items(parent_id);
CREATE INDEX IF NOT EXISTS idx_thread_results_parent ON thread_results(parent_thread_id);
CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_do_items_project ON do_items(project_id);
CREATE INDEX IF NOT EXISTS idx_dont_items_project ON dont_items(project_id);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Bool,
    /// JSON document stored as TEXT
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub required: bool,
}

const fn col(name: &'static str, ty: ColumnType, required: bool) -> Column {
    Column { name, ty, required }
}

use ColumnType::{Bool, Integer, Json, Text};

const USERS: &[Column] = &[
    col("id", Text, true),
    col("name", Text, true),
    col("created_at", Text, true),
];

const PERSONAS: &[Column] = &[
    col("id", Text, true),
    col("user_id", Text, true),
    col("name", Text, true),
    col("description", Text, false),
    col("order", Integer, false),
    col("problem_ids", Json, false),
    col("created_at", Text, true),
];

const OBJECTIVES: &[Column] = &[
    col("id", Text, true),
    col("user_id", Text, true),
    col("title", Text, true),
    col("description", Text, false),
    col("order", Integer, false),
    col("gap_ids", Json, false),
    col("problem_ids", Json, false),
    col("project_id", Text, false),
    col("star_report_id", Text, false),
    col("retrospective_report_id", Text, false),
    col("created_at", Text, true),
];

const GAPS: &[Column] = &[
    col("id", Text, true),
    col("objective_id", Text, true),
    col("ideal_state", Text, true),
    col("current_state", Text, true),
    col("problem_ids", Json, false),
    col("created_at", Text, true),
];

const PROBLEMS: &[Column] = &[
    col("id", Text, true),
    col("title", Text, true),
    col("description", Text, false),
    col("persona_id", Text, false),
    col("objective_id", Text, false),
    col("gap_id", Text, false),
    col("parent_id", Text, false),
    col("child_problem_ids", Json, false),
    col("child_thread_ids", Json, false),
    col("project_id", Text, false),
    col("retrospective_report_id", Text, false),
    col("star_report_id", Text, false),
    col("is_resolved", Bool, false),
    col("created_at", Text, true),
];

const PROJECTS: &[Column] = &[
    col("id", Text, true),
    col("problem_id", Text, false),
    col("objective_id", Text, false),
    col("title", Text, true),
    col("description", Text, false),
    col("task_ids", Json, false),
    col("do_item_ids", Json, false),
    col("dont_item_ids", Json, false),
    col("created_at", Text, true),
];

const THREAD_ITEMS: &[Column] = &[
    col("id", Text, true),
    col("problem_id", Text, true),
    col("parent_id", Text, false),
    col("child_thread_ids", Json, false),
    col("type", Text, true),
    col("content", Text, false),
    col("is_important", Bool, false),
    col("result_ids", Json, false),
    col("author_id", Text, false),
    col("created_at", Text, true),
    col("is_resolved", Bool, false),
    col("is_completed", Bool, false),
    col("status", Text, false),
    col("time_spent", Integer, false),
    col("deadline", Text, false),
    col("completed_at", Text, false),
    col("start_time", Text, false),
];

const THREAD_RESULTS: &[Column] = &[
    col("id", Text, true),
    col("parent_thread_id", Text, true),
    col("content", Text, true),
    col("created_at", Text, true),
];

const TASKS: &[Column] = &[
    col("id", Text, true),
    col("project_id", Text, true),
    col("title", Text, true),
    col("status", Text, true),
    col("is_locked", Bool, false),
    col("created_at", Text, true),
];

const HABIT_ITEMS: &[Column] = &[
    col("id", Text, true),
    col("project_id", Text, true),
    col("title", Text, true),
    col("success_count", Integer, false),
    col("failure_count", Integer, false),
    col("is_locked", Bool, false),
    col("created_at", Text, true),
];

const STAR_REPORTS: &[Column] = &[
    col("id", Text, true),
    col("problem_id", Text, false),
    col("objective_id", Text, false),
    col("situation", Text, false),
    col("task", Text, false),
    col("action", Text, false),
    col("result", Text, false),
    col("created_at", Text, true),
];

const RETROSPECTIVE_REPORTS: &[Column] = &[
    col("id", Text, true),
    col("problem_id", Text, false),
    col("objective_id", Text, false),
    col("went_well", Text, false),
    col("to_improve", Text, false),
    col("action_items", Json, false),
    col("created_at", Text, true),
];

const ACTIVE_SESSION: &[Column] = &[
    col("id", Text, true),
    col("thread_id", Text, true),
    col("start_time", Text, true),
    col("is_paused", Bool, false),
    col("paused_time", Integer, false),
];

/// Column layout of the table holding `kind`.
pub fn columns(kind: EntityKind) -> &'static [Column] {
    match kind {
        EntityKind::User => USERS,
        EntityKind::Persona => PERSONAS,
        EntityKind::Objective => OBJECTIVES,
        EntityKind::Gap => GAPS,
        EntityKind::Problem => PROBLEMS,
        EntityKind::Project => PROJECTS,
        EntityKind::ThreadItem => THREAD_ITEMS,
        EntityKind::ThreadResult => THREAD_RESULTS,
        EntityKind::Task => TASKS,
        EntityKind::DoItem | EntityKind::DontItem => HABIT_ITEMS,
        EntityKind::StarReport => STAR_REPORTS,
        EntityKind::RetrospectiveReport => RETROSPECTIVE_REPORTS,
        EntityKind::ActiveSession => ACTIVE_SESSION,
    }
}

pub fn column(kind: EntityKind, name: &str) -> Option<&'static Column> {
    columns(kind).iter().find(|c| c.name == name)
}
