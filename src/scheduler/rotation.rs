//! Rotation trigger scheduling
//!
//! A small best-effort scheduler: a once-per-second tick compares the current
//! wall-clock time, in one fixed timezone, against every configured trigger
//! time and fires the matching rotations. Triggers fire at most once per
//! matching second; ticks that never happen are simply skipped, never caught
//! up.
//!
//! [`SchedulerState`] is the pure core (`arm`/`tick`), owned and clock-free so
//! independent schedulers can coexist and be tested without global teardown.
//! [`RotationScheduler`] wraps it in the tokio tick loop.

use crate::rotation::RotationAction;
use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// One configured trigger: a time of day bound to a rotation.
///
/// Several entries may share the same action; each fires independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub trigger: NaiveTime,
    pub action: RotationAction,
}

/// Owned trigger set with second-granularity evaluation.
#[derive(Debug)]
pub struct SchedulerState {
    tz: Tz,
    entries: Vec<ScheduleEntry>,
    last_evaluated: Option<NaiveDateTime>,
}

impl SchedulerState {
    pub fn new(tz: Tz) -> Self {
        Self { tz, entries: Vec::new(), last_evaluated: None }
    }

    /// Replace the whole trigger set. There are no partial updates: arming
    /// tears down every previous trigger before registering the new ones.
    pub fn arm(&mut self, entries: Vec<ScheduleEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Evaluate all triggers against `now` and return the actions due.
    ///
    /// A trigger is due when the local time-of-day equals its trigger time to
    /// the second. Evaluating the same wall second twice yields nothing the
    /// second time, so a delayed tick cannot double-fire.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<RotationAction> {
        let local = now.with_timezone(&self.tz).naive_local();
        let local = local.with_nanosecond(0).unwrap_or(local);
        if self.last_evaluated == Some(local) {
            return Vec::new();
        }
        self.last_evaluated = Some(local);

        let time = local.time();
        self.entries
            .iter()
            .filter(|entry| entry.trigger == time)
            .map(|entry| entry.action)
            .collect()
    }
}

/// Tokio-driven scheduler: ticks once per second and runs due rotations.
///
/// The fired action is awaited on the tick task itself; a slow action delays
/// the next evaluation, so handlers must stay bounded or hand long work off
/// to a separate task.
pub struct RotationScheduler {
    state: Arc<Mutex<SchedulerState>>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RotationScheduler {
    pub fn new(tz: Tz) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new(tz))),
            handle: Mutex::new(None),
        }
    }

    /// Re-arm with a new trigger set, atomically replacing all pending
    /// triggers. Safe to call at any time, before or after `start`.
    pub fn apply(&self, entries: Vec<ScheduleEntry>) {
        let mut state = self.state.lock();
        info!(
            count = entries.len(),
            tz = %state.timezone(),
            "scheduler armed"
        );
        state.arm(entries);
    }

    /// Number of currently armed triggers.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries().len()
    }

    /// Spawn the tick loop, invoking `on_fire` for every due rotation.
    /// Starting again replaces the previous loop.
    pub fn start<F, Fut>(&self, on_fire: F)
    where
        F: Fn(RotationAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let due = state.lock().tick(Utc::now());
                for action in due {
                    info!(%action, "rotation trigger fired");
                    on_fire(action).await;
                }
            }
        });

        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop the tick loop. Armed entries stay in place for a later `start`.
    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
        }
    }
}
