//! Priority calculation for tasks.
//!
//! Effective priority is the sum of:
//! - Base priority from the category tier table (unknown categories get the lowest tier)
//! - Rule contributions, computed once when the task is added
//! - Age bonus, SLA bonus and starvation bonus from the aging pass
//! - Dynamic adjustment from execution feedback
//!
//! The result never drops below the lowest configured tier.

use std::collections::BTreeMap;

use crate::config::SchedulerConfig;
use crate::domain::{Task, TaskDetails};
use crate::scheduler::lanes::LaneClassifier;
use crate::scheduler::rules::{RuleEngine, RuleOutcome};

/// Initial scoring of a freshly ingested record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialPriority {
    pub base_priority: i64,
    pub rules: RuleOutcome,
}

impl InitialPriority {
    pub fn unclamped(&self) -> i64 {
        self.base_priority.saturating_add(self.rules.sum)
    }
}

/// Turns categories and priority components into effective priorities.
#[derive(Debug, Clone)]
pub struct PriorityCalculator {
    levels: BTreeMap<String, i64>,
    min_tier: i64,
}

impl PriorityCalculator {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            levels: config.priority_levels.clone(),
            min_tier: config.min_tier(),
        }
    }

    /// Tier value for `category`, falling back to the lowest tier.
    pub fn base_priority(&self, category: &str) -> i64 {
        match self.levels.get(category) {
            Some(value) => *value,
            None => {
                tracing::debug!(category = %category, fallback = self.min_tier, "Unknown category, using lowest tier");
                self.min_tier
            }
        }
    }

    /// Base tier plus the rule sum for a new record.
    pub fn initial(&self, details: &TaskDetails, rules: &RuleEngine) -> InitialPriority {
        let base_priority = self.base_priority(&details.category);
        let rules = rules.evaluate(details, base_priority);
        InitialPriority { base_priority, rules }
    }

    /// Effective priority from a task's stored components.
    pub fn effective(&self, task: &Task) -> i64 {
        self.clamp(task.component_sum())
    }

    pub fn clamp(&self, priority: i64) -> i64 {
        priority.max(self.min_tier)
    }

    pub fn min_tier(&self) -> i64 {
        self.min_tier
    }

    /// Recompute `priority` and `lane` together.
    ///
    /// Returns the previous priority when the value changed.
    pub fn reprice(&self, task: &mut Task, lanes: &LaneClassifier) -> Option<i64> {
        let previous = task.priority;
        let priority = self.effective(task);
        task.priority = priority;
        task.lane = lanes.classify(priority).to_string();
        (priority != previous).then_some(previous)
    }
}
