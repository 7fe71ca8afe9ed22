//! Outcome-driven priority adjustment.
//!
//! A failure raises `dynamic_adjustment_total` by `failure_increase` (capped at
//! `max_adjustment`) and puts the task back in the queue. A success after
//! earlier failures lowers it by `success_decrease`, never below zero.

use chrono::{DateTime, Utc};

use crate::config::{DynamicAdjustmentConfig, SchedulerConfig};
use crate::domain::{Task, TaskStatus};

#[derive(Debug, Clone)]
pub struct FeedbackAdjuster {
    config: DynamicAdjustmentConfig,
}

impl FeedbackAdjuster {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            config: config.dynamic_adjustment,
        }
    }

    /// Record a failed attempt and requeue the task.
    ///
    /// Starts a fresh queued period: `wait_start` resets and the starvation
    /// boost becomes available again.
    pub fn apply_failure(&self, task: &mut Task, error: &str, now: DateTime<Utc>) {
        task.transition(TaskStatus::Failed, now, Some(error.to_string()));
        task.attempts += 1;

        if self.config.enabled {
            task.dynamic_adjustment_total = task
                .dynamic_adjustment_total
                .saturating_add(self.config.failure_increase)
                .min(self.config.max_adjustment);
        }

        task.transition(TaskStatus::Queued, now, None);
        task.wait_start = now;
        task.started_at = None;
        task.starvation_boost_applied = false;
        task.starvation_bonus = 0;
    }

    /// De-escalate a task that succeeded after failing. Returns the applied
    /// decrease.
    pub fn apply_success(&self, task: &mut Task) -> i64 {
        if !self.config.enabled || task.attempts == 0 {
            return 0;
        }
        let before = task.dynamic_adjustment_total;
        task.dynamic_adjustment_total = before.saturating_sub(self.config.success_decrease).max(0);
        before - task.dynamic_adjustment_total
    }
}
