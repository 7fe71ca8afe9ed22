//! Time-based escalation of queued tasks.
//!
//! Run once per tick over every Queued task:
//! - Age escalation: `min((age_hours - threshold) * hourly_increase, max_increase)`,
//!   recomputed fresh each pass so it never drifts past the cap
//! - SLA boost: fixed addend once the task outlives its SLA window, applied once
//! - Starvation prevention: fixed addend once the current wait reaches
//!   `max_wait_time`, applied once per queued period

use chrono::{DateTime, Utc};

use crate::config::{AgeEscalationConfig, SchedulerConfig, SlaConfig, StarvationConfig};
use crate::domain::Task;
use crate::id::{elapsed_ms, hours_between};
use crate::scheduler::lanes::LaneClassifier;
use crate::scheduler::priority::PriorityCalculator;
use crate::scheduler::store::TaskStore;

/// What one refresh did to one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgingEffect {
    /// Age bonus went from zero to positive
    pub age_escalated: bool,
    pub sla_boosted: bool,
    pub starvation_boosted: bool,
}

/// Summary of a full aging pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgingReport {
    /// Tasks whose numeric priority changed, with the new value
    pub changed: Vec<(String, i64)>,
    pub age_escalations: u64,
    pub sla_boosts: u64,
    pub starvation_preventions: u64,
}

impl AgingReport {
    /// Escalations in the analytics sense: age plus SLA.
    pub fn escalations(&self) -> u64 {
        self.age_escalations + self.sla_boosts
    }
}

/// Re-scores queued tasks as time passes.
#[derive(Debug, Clone)]
pub struct AgingEngine {
    age: AgeEscalationConfig,
    sla: SlaConfig,
    starvation: StarvationConfig,
}

impl AgingEngine {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            age: config.age_escalation,
            sla: config.sla.clone(),
            starvation: config.starvation_prevention,
        }
    }

    /// Age bonus for a task created at `created_at`.
    pub fn age_bonus(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        if !self.age.enabled {
            return 0;
        }
        let age_hours = hours_between(created_at, now);
        if age_hours <= self.age.threshold_hours {
            return 0;
        }
        let bonus = ((age_hours - self.age.threshold_hours) * self.age.hourly_increase).floor() as i64;
        bonus.min(self.age.max_increase)
    }

    /// Update a task's time-based components. Does not touch `priority`.
    pub fn refresh(&self, task: &mut Task, now: DateTime<Utc>) -> AgingEffect {
        let mut effect = AgingEffect::default();

        let age_bonus = self.age_bonus(task.created_at, now);
        effect.age_escalated = task.age_bonus == 0 && age_bonus > 0;
        task.age_bonus = age_bonus;

        if self.sla.enabled
            && !task.sla_boost_applied
            && let Some(level) = self.sla.levels.get(&task.sla_level)
            && hours_between(task.created_at, now) > level.hours
        {
            task.sla_bonus = level.priority_boost;
            task.sla_boost_applied = true;
            effect.sla_boosted = true;
        }

        if self.starvation.enabled
            && !task.starvation_boost_applied
            && elapsed_ms(task.wait_start, now) >= self.starvation.max_wait_time
        {
            task.starvation_bonus = self.starvation.priority_boost;
            task.starvation_boost_applied = true;
            effect.starvation_boosted = true;
        }

        effect
    }

    /// Refresh every Queued task in the store and reprice it.
    pub fn run(
        &self,
        store: &mut TaskStore,
        calculator: &PriorityCalculator,
        lanes: &LaneClassifier,
        now: DateTime<Utc>,
    ) -> AgingReport {
        let mut report = AgingReport::default();

        for id in store.queued_ids() {
            let outcome = store.update(&id, |task| {
                let effect = self.refresh(task, now);
                let previous = calculator.reprice(task, lanes);
                (effect, previous.map(|_| task.priority))
            });

            let Some((effect, changed)) = outcome else {
                continue;
            };

            if effect.age_escalated {
                report.age_escalations += 1;
            }
            if effect.sla_boosted {
                tracing::info!(task_id = %id, "SLA window exceeded, boost applied");
                report.sla_boosts += 1;
            }
            if effect.starvation_boosted {
                tracing::info!(task_id = %id, "Starvation prevention boost applied");
                report.starvation_preventions += 1;
            }
            if let Some(priority) = changed {
                tracing::debug!(task_id = %id, priority, "Priority updated by aging");
                report.changed.push((id, priority));
            }
        }

        report
    }
}
