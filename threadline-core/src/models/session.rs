use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of the singleton `active_session` record.
pub const ACTIVE_SESSION_ID: &str = "active";

/// Persisted form of the running or paused session timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub thread_id: String,
    pub start_time: DateTime<Utc>,
    pub is_paused: bool,
    /// Seconds accumulated before the current running stretch
    pub paused_time: i64,
}

impl ActiveSession {
    pub fn new(
        thread_id: impl Into<String>,
        start_time: DateTime<Utc>,
        is_paused: bool,
        paused_time: i64,
    ) -> Self {
        Self {
            id: ACTIVE_SESSION_ID.to_string(),
            thread_id: thread_id.into(),
            start_time,
            is_paused,
            paused_time,
        }
    }
}
