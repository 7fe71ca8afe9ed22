//! Preemption of running work by higher-priority arrivals.
//!
//! A candidate may preempt only when preemption is enabled, its category is
//! in `allowed_task_types`, and some running task trails it by at least
//! `min_priority_difference`. Among qualifying victims the lowest priority
//! loses; ties go against the most recently started task.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{PreemptionConfig, SchedulerConfig};
use crate::domain::{Task, TaskStatus};
use crate::id::elapsed_ms;
use crate::scheduler::store::TaskStore;

/// A task brought back from preemption.
#[derive(Debug, Clone)]
pub struct ResumedTask {
    pub task: Task,
    pub preemption_duration_ms: u64,
    pub state: Option<Value>,
}

/// Decides whether and whom to preempt, and performs the bookkeeping.
#[derive(Debug, Clone)]
pub struct PreemptionController {
    config: PreemptionConfig,
}

impl PreemptionController {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            config: config.preemption.clone(),
        }
    }

    fn category_allowed(&self, candidate: &Task) -> bool {
        self.config.allowed_task_types.iter().any(|t| *t == candidate.category)
    }

    fn gap_satisfied(&self, candidate: &Task, running: &Task) -> bool {
        candidate.priority.saturating_sub(running.priority) >= self.config.min_priority_difference
    }

    /// True if `candidate` may evict some running task.
    pub fn can_preempt(&self, candidate: &Task, store: &TaskStore) -> bool {
        self.select_victim(candidate, store).is_some()
    }

    /// The running task `candidate` would evict, if any.
    pub fn select_victim(&self, candidate: &Task, store: &TaskStore) -> Option<String> {
        if !self.config.enabled || !self.category_allowed(candidate) {
            return None;
        }

        store
            .running()
            .filter(|running| running.id != candidate.id && self.gap_satisfied(candidate, running))
            .min_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    // later start sorts first, so the newest run is chosen
                    .then_with(|| b.started_at.cmp(&a.started_at))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|victim| victim.id.clone())
    }

    /// Running -> Preempted, saving the executor's state.
    ///
    /// Returns false without side effects if the task is not Running.
    pub fn preempt(&self, store: &mut TaskStore, id: &str, state: Option<Value>, now: DateTime<Utc>) -> bool {
        if store.get(id).map(|t| t.status) != Some(TaskStatus::Running) {
            return false;
        }

        store
            .update(id, |task| {
                task.transition(TaskStatus::Preempted, now, None);
                task.preempted_state = state;
                task.preempted_at = Some(now);
            })
            .is_some()
    }

    /// Preempted -> Running, bypassing the queue ranking.
    ///
    /// Returns None without side effects if the task is not Preempted.
    pub fn resume(&self, store: &mut TaskStore, id: &str, now: DateTime<Utc>) -> Option<ResumedTask> {
        if store.get(id)?.status != TaskStatus::Preempted {
            return None;
        }

        store.update(id, |task| {
            let preempted_at = task.preempted_at.take().unwrap_or(now);
            let state = task.preempted_state.take();
            task.transition(TaskStatus::Running, now, None);
            task.started_at = Some(now);
            ResumedTask {
                task: task.clone(),
                preemption_duration_ms: elapsed_ms(preempted_at, now),
                state,
            }
        })
    }
}
