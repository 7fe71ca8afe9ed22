//! Task record and related types
//!
//! A Task is the scheduler's view of one work item. Its effective priority is
//! always the sum of a handful of stored components, so any re-scoring is a
//! pure recomputation rather than an incremental drift.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::details::TaskDetails;

/// Execution status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for a slot
    Queued,
    /// Admitted and handed to the executor
    Running,
    /// Evicted by a higher-priority arrival, state saved
    Preempted,
    /// Finished successfully
    Completed,
    /// Execution attempt failed
    Failed,
}

impl TaskStatus {
    /// Returns true if the task occupies an execution slot
    pub fn holds_slot(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Preempted => "preempted",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Service level requested by the source item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaLevel {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl fmt::Display for SlaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlaLevel::Critical => "critical",
            SlaLevel::High => "high",
            SlaLevel::Normal => "normal",
            SlaLevel::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// One entry in a task's append-only history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: TaskStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A scheduled work item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    //=== Identity ===
    pub id: String,
    pub category: String,
    pub labels: BTreeSet<String>,
    pub assignees: Vec<String>,
    pub mentions: Vec<String>,
    pub repository: String,
    pub sla_level: SlaLevel,

    //=== Priority components ===
    /// Tier value looked up from the category
    pub base_priority: i64,
    /// Sum of rule contributions at admission to the queue
    pub rule_sum: i64,
    /// Age escalation, recomputed every tick
    pub age_bonus: i64,
    /// Fixed SLA addend once the SLA window has passed
    pub sla_bonus: i64,
    /// Fixed starvation addend for the current queued period
    pub starvation_bonus: i64,
    /// Cumulative feedback-driven adjustment
    pub dynamic_adjustment_total: i64,

    //=== Derived ===
    /// Current effective priority
    pub priority: i64,
    /// Lane name, always the classification of `priority`
    pub lane: String,

    //=== Runtime State ===
    pub status: TaskStatus,
    pub attempts: u32,
    pub sla_boost_applied: bool,
    pub starvation_boost_applied: bool,
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preempted_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preempted_at: Option<DateTime<Utc>>,

    //=== Timestamps ===
    pub created_at: DateTime<Utc>,
    /// Reset whenever the task (re-)enters Queued
    pub wait_start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a queued task from an ingested record.
    ///
    /// `priority` and `lane` are left for the caller to assign, since they
    /// depend on the lane configuration.
    pub fn from_details(details: TaskDetails, base_priority: i64, rule_sum: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: details.id,
            category: details.category,
            labels: details.labels.into_iter().collect(),
            assignees: details.assignees,
            mentions: details.mentions,
            repository: details.repository,
            sla_level: details.sla_level,
            base_priority,
            rule_sum,
            age_bonus: 0,
            sla_bonus: 0,
            starvation_bonus: 0,
            dynamic_adjustment_total: 0,
            priority: base_priority.saturating_add(rule_sum),
            lane: String::new(),
            status: TaskStatus::Queued,
            attempts: 0,
            sla_boost_applied: false,
            starvation_boost_applied: false,
            history: vec![HistoryEntry {
                status: TaskStatus::Queued,
                timestamp: now,
                error: None,
            }],
            preempted_state: None,
            preempted_at: None,
            created_at: details.created_at,
            wait_start: now,
            started_at: None,
        }
    }

    /// Sum of all priority components, before clamping. Saturates.
    pub fn component_sum(&self) -> i64 {
        [
            self.rule_sum,
            self.age_bonus,
            self.sla_bonus,
            self.starvation_bonus,
            self.dynamic_adjustment_total,
        ]
        .into_iter()
        .fold(self.base_priority, i64::saturating_add)
    }

    /// Change status and append the history entry in one step
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>, error: Option<String>) {
        self.status = status;
        self.history.push(HistoryEntry {
            status,
            timestamp: now,
            error,
        });
    }

    /// Returns true if the task carries the given label
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}
