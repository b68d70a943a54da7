use std::collections::HashSet;

use tokio::sync::watch;

use crate::codec;
use crate::error::{EngineError, Result, StoreError};
use crate::graph::NodeRef;
use crate::models::{
    ActiveSession, EntityKind, ThreadItem, ThreadKind, ThreadType, ACTIVE_SESSION_ID,
};
use crate::session::SessionTimer;
use crate::store::{Filter, RecordStore};

use super::Engine;

fn session_label(seconds: i64) -> String {
    format!(
        "Session {:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

impl<S: RecordStore> Engine<S> {
    pub fn session(&self) -> &SessionTimer {
        &self.timer
    }

    /// Receiver of every committed timer state.
    pub fn subscribe_session(&self) -> watch::Receiver<SessionTimer> {
        self.session_tx.subscribe()
    }

    /// Seconds on the active session, recomputed from the current clock.
    pub fn session_elapsed(&self) -> i64 {
        self.timer.elapsed(self.clock.now())
    }

    /// Persisted row of the active session, if any.
    pub fn active_session(&self) -> Option<ActiveSession> {
        self.timer.to_active()
    }

    fn set_timer(&mut self, next: SessionTimer) {
        self.timer = next.clone();
        self.session_tx.send_replace(next);
    }

    /// Write the singleton row for `timer`.
    async fn persist_timer(&self, timer: &SessionTimer) -> std::result::Result<(), StoreError> {
        let Some(row) = timer.to_active() else {
            self.store
                .delete(EntityKind::ActiveSession, &[ACTIVE_SESSION_ID.to_string()])
                .await?;
            return Ok(());
        };
        let record = codec::encode(&row).map_err(|e| StoreError::Backend(e.to_string()))?;
        match self
            .store
            .update(EntityKind::ActiveSession, record.clone())
            .await
        {
            Err(StoreError::NotFound { .. }) => {
                self.store.insert(EntityKind::ActiveSession, record).await
            }
            other => other,
        }
    }

    async fn commit_timer(&mut self, next: SessionTimer, action: &'static str) -> Result<SessionTimer> {
        self.persist_timer(&next)
            .await
            .map_err(|e| EngineError::store(action, e))?;
        self.set_timer(next.clone());
        Ok(next)
    }

    /// Start timing work on a thread item. Fails unless the timer is idle.
    pub async fn start_session(&mut self, thread_id: &str) -> Result<SessionTimer> {
        let next = self.timer.start(thread_id, self.clock.now())?;
        let node = NodeRef::new(EntityKind::ThreadItem, thread_id);
        if self.locate(&node).await?.is_none() {
            return Err(EngineError::not_found(EntityKind::ThreadItem, thread_id));
        }
        let next = self.commit_timer(next, "start session").await?;
        tracing::info!("Session started on thread {}", thread_id);
        Ok(next)
    }

    pub async fn pause_session(&mut self) -> Result<SessionTimer> {
        let next = self.timer.pause(self.clock.now())?;
        let next = self.commit_timer(next, "pause session").await?;
        tracing::info!("Session paused at {}s", next.elapsed(self.clock.now()));
        Ok(next)
    }

    pub async fn resume_session(&mut self) -> Result<SessionTimer> {
        let next = self.timer.resume(self.clock.now())?;
        let next = self.commit_timer(next, "resume session").await?;
        tracing::info!("Session resumed");
        Ok(next)
    }

    /// Stop the session and record it as a Session item replying to the
    /// timed thread item.
    pub async fn stop_session(&mut self) -> Result<ThreadItem> {
        let stopped = self.timer.stop(self.clock.now())?;

        let thread = NodeRef::new(EntityKind::ThreadItem, stopped.thread_id.clone());
        let problem_id = match self.locate(&thread).await? {
            Some((record, _)) => record
                .get("problem_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            None => None,
        };
        let Some(problem_id) = problem_id else {
            tracing::warn!("Session thread {} no longer exists, discarding", stopped.thread_id);
            self.discard_session().await;
            return Err(EngineError::not_found(EntityKind::ThreadItem, stopped.thread_id));
        };

        let item = ThreadItem::new(problem_id, ThreadType::Session, session_label(stopped.elapsed))
            .reply_to(stopped.thread_id.clone())
            .with_kind(ThreadKind::Session {
                time_spent: stopped.elapsed,
                start_time: stopped.start_time,
            });
        let item = self.add(item).await?;

        self.discard_session().await;
        tracing::info!(
            "Session stopped on thread {} at {} after {}s",
            stopped.thread_id,
            stopped.stopped_at,
            stopped.elapsed
        );
        Ok(item)
    }

    /// Drop the active session without recording it.
    async fn discard_session(&mut self) {
        if let Err(e) = self.persist_timer(&SessionTimer::Idle).await {
            tracing::error!("Could not clear active session row: {}", e);
        }
        self.set_timer(SessionTimer::Idle);
    }

    pub(crate) async fn discard_session_for(&mut self, deleted_threads: &HashSet<String>) {
        let orphaned = self
            .timer
            .thread_id()
            .is_some_and(|id| deleted_threads.contains(id));
        if orphaned {
            tracing::info!("Active session thread deleted, discarding session");
            self.discard_session().await;
        }
    }

    /// Reload the persisted session row into the timer.
    pub async fn restore_session(&mut self) -> Result<SessionTimer> {
        let rows = self
            .store
            .select(EntityKind::ActiveSession, &Filter::All)
            .await
            .map_err(|e| EngineError::store("restore session", e))?;
        let timer = match rows.first() {
            Some(row) => codec::decode::<ActiveSession>(row)
                .map(SessionTimer::from)
                .map_err(|e| EngineError::codec(EntityKind::ActiveSession, e))?,
            None => SessionTimer::Idle,
        };
        if timer.is_active() {
            tracing::info!("Restored {} session", timer.phase());
        }
        self.set_timer(timer.clone());
        Ok(timer)
    }

    /// Newest Session item in the cache.
    pub fn most_recent_session(&self) -> Option<&ThreadItem> {
        self.cache
            .thread_items
            .iter()
            .filter(|item| item.thread_type() == ThreadType::Session)
            .max_by_key(|item| item.created_at)
    }

    /// Cached items of one type under a problem, in canonical order.
    pub fn thread_items_by_type(&self, problem_id: &str, ty: ThreadType) -> Vec<&ThreadItem> {
        self.cache
            .thread_items
            .iter()
            .filter(|item| item.problem_id == problem_id && item.thread_type() == ty)
            .collect()
    }
}
