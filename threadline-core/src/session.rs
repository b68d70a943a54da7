//! Session timer state machine.
//!
//! At most one session runs at a time. The timer is a value: transitions
//! return the next state and the engine commits it once the
//! `active_session` row has been written.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};
use crate::models::ActiveSession;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Coarse state of the timer, used in errors and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionTimer {
    #[default]
    Idle,
    Running {
        thread_id: String,
        /// Start of the current running stretch
        start_time: DateTime<Utc>,
        /// Seconds accumulated before `start_time`
        paused_time: i64,
    },
    Paused {
        thread_id: String,
        start_time: DateTime<Utc>,
        paused_time: i64,
    },
}

/// What a stopped session amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedSession {
    pub thread_id: String,
    /// Seconds
    pub elapsed: i64,
    /// `stopped_at - elapsed`
    pub start_time: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

impl SessionTimer {
    pub fn phase(&self) -> TimerPhase {
        match self {
            SessionTimer::Idle => TimerPhase::Idle,
            SessionTimer::Running { .. } => TimerPhase::Running,
            SessionTimer::Paused { .. } => TimerPhase::Paused,
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        match self {
            SessionTimer::Idle => None,
            SessionTimer::Running { thread_id, .. } | SessionTimer::Paused { thread_id, .. } => {
                Some(thread_id.as_str())
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionTimer::Idle)
    }

    /// Elapsed seconds at `now`. Recomputed from the stored fields on every
    /// call, never accumulated.
    pub fn elapsed(&self, now: DateTime<Utc>) -> i64 {
        match self {
            SessionTimer::Idle => 0,
            SessionTimer::Running {
                start_time,
                paused_time,
                ..
            } => paused_time + seconds_between(*start_time, now),
            SessionTimer::Paused { paused_time, .. } => *paused_time,
        }
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidStateTransition {
            action,
            from: self.phase(),
        }
    }

    pub fn start(&self, thread_id: impl Into<String>, now: DateTime<Utc>) -> Result<SessionTimer> {
        match self {
            SessionTimer::Idle => Ok(SessionTimer::Running {
                thread_id: thread_id.into(),
                start_time: now,
                paused_time: 0,
            }),
            _ => Err(self.invalid("start")),
        }
    }

    pub fn pause(&self, now: DateTime<Utc>) -> Result<SessionTimer> {
        match self {
            SessionTimer::Running {
                thread_id,
                start_time,
                paused_time,
            } => Ok(SessionTimer::Paused {
                thread_id: thread_id.clone(),
                start_time: *start_time,
                paused_time: paused_time + seconds_between(*start_time, now),
            }),
            _ => Err(self.invalid("pause")),
        }
    }

    pub fn resume(&self, now: DateTime<Utc>) -> Result<SessionTimer> {
        match self {
            SessionTimer::Paused {
                thread_id,
                paused_time,
                ..
            } => Ok(SessionTimer::Running {
                thread_id: thread_id.clone(),
                start_time: now,
                paused_time: *paused_time,
            }),
            _ => Err(self.invalid("resume")),
        }
    }

    pub fn stop(&self, now: DateTime<Utc>) -> Result<StoppedSession> {
        let Some(thread_id) = self.thread_id() else {
            return Err(self.invalid("stop"));
        };
        let elapsed = self.elapsed(now);
        Ok(StoppedSession {
            thread_id: thread_id.to_string(),
            elapsed,
            start_time: now - Duration::seconds(elapsed),
            stopped_at: now,
        })
    }

    /// Row form of an active timer.
    pub fn to_active(&self) -> Option<ActiveSession> {
        match self {
            SessionTimer::Idle => None,
            SessionTimer::Running {
                thread_id,
                start_time,
                paused_time,
            } => Some(ActiveSession::new(thread_id, *start_time, false, *paused_time)),
            SessionTimer::Paused {
                thread_id,
                start_time,
                paused_time,
            } => Some(ActiveSession::new(thread_id, *start_time, true, *paused_time)),
        }
    }
}

impl From<ActiveSession> for SessionTimer {
    fn from(row: ActiveSession) -> Self {
        if row.is_paused {
            SessionTimer::Paused {
                thread_id: row.thread_id,
                start_time: row.start_time,
                paused_time: row.paused_time,
            }
        } else {
            SessionTimer::Running {
                thread_id: row.thread_id,
                start_time: row.start_time,
                paused_time: row.paused_time,
            }
        }
    }
}

/// Background task republishing elapsed seconds on a fixed period.
pub struct ElapsedTicker {
    handle: JoinHandle<()>,
    elapsed: watch::Receiver<i64>,
}

impl ElapsedTicker {
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.elapsed.clone()
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Recompute the elapsed time every `period` and whenever the timer state
/// changes. Stops once the timer sender is dropped.
pub fn spawn_elapsed_ticker(
    mut timer: watch::Receiver<SessionTimer>,
    clock: Arc<dyn Clock>,
    period: StdDuration,
) -> ElapsedTicker {
    let initial = timer.borrow().elapsed(clock.now());
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = timer.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let elapsed = timer.borrow().elapsed(clock.now());
            tx.send_if_modified(|current| {
                let modified = *current != elapsed;
                *current = elapsed;
                modified
            });
        }
        tracing::debug!("Elapsed ticker stopped");
    });

    ElapsedTicker {
        handle,
        elapsed: rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn test_pause_resume_stop_scenario() {
        let running = SessionTimer::Idle.start("t1", t0()).unwrap();
        let paused = running.pause(t0() + secs(300)).unwrap();
        assert_eq!(paused.elapsed(t0() + secs(400)), 300);

        let resumed = paused.resume(t0() + secs(420)).unwrap();
        let stopped = resumed.stop(t0() + secs(600)).unwrap();
        assert_eq!(stopped.elapsed, 480);
        assert_eq!(stopped.start_time, t0() + secs(600) - secs(480));
        assert_eq!(stopped.thread_id, "t1");
    }

    #[test]
    fn test_stop_after_pause_adds_nothing() {
        let paused = SessionTimer::Idle
            .start("t1", t0())
            .unwrap()
            .pause(t0() + secs(90))
            .unwrap();
        let stopped = paused.stop(t0() + secs(5000)).unwrap();
        assert_eq!(stopped.elapsed, 90);
        assert_eq!(stopped.stopped_at, t0() + secs(5000));
        assert_eq!(stopped.start_time, stopped.stopped_at - secs(90));
    }

    #[test]
    fn test_illegal_transitions() {
        let running = SessionTimer::Idle.start("t1", t0()).unwrap();
        assert!(matches!(
            running.start("t2", t0()),
            Err(EngineError::InvalidStateTransition {
                from: TimerPhase::Running,
                ..
            })
        ));
        assert!(running.resume(t0()).is_err());
        assert!(SessionTimer::Idle.pause(t0()).is_err());
        assert!(SessionTimer::Idle.stop(t0()).is_err());
        assert!(running.pause(t0()).unwrap().pause(t0()).is_err());
    }

    #[test]
    fn test_row_conversion() {
        let paused = SessionTimer::Paused {
            thread_id: "t1".into(),
            start_time: t0(),
            paused_time: 42,
        };
        let row = paused.to_active().unwrap();
        assert!(row.is_paused);
        assert_eq!(SessionTimer::from(row), paused);
        assert!(SessionTimer::Idle.to_active().is_none());
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(t0());
        let other = clock.clone();
        clock.advance(secs(30));
        assert_eq!(other.now(), t0() + secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_follows_state_and_clock() {
        let clock = ManualClock::new(t0());
        let (tx, rx) = watch::channel(SessionTimer::Idle);
        let ticker = spawn_elapsed_ticker(rx, Arc::new(clock.clone()), StdDuration::from_secs(1));
        let mut elapsed = ticker.subscribe();
        assert_eq!(*elapsed.borrow(), 0);

        tx.send(SessionTimer::Idle.start("t1", t0()).unwrap()).unwrap();
        clock.advance(secs(5));
        let seen = tokio::time::timeout(StdDuration::from_secs(10), elapsed.wait_for(|v| *v == 5))
            .await
            .unwrap()
            .map(|v| *v)
            .unwrap();
        assert_eq!(seen, 5);

        clock.advance(secs(7));
        let seen = tokio::time::timeout(StdDuration::from_secs(10), elapsed.wait_for(|v| *v == 12))
            .await
            .unwrap()
            .map(|v| *v)
            .unwrap();
        assert_eq!(seen, 12);
    }
}
