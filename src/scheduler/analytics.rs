//! Counters, queue snapshots and advisory reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::domain::TaskStatus;

/// Running totals since the scheduler was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    pub ticks: u64,
    pub tasks_added: u64,
    pub tasks_started: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_removed: u64,
    pub preemptions: u64,
    pub resumes: u64,
    /// Age escalations plus SLA boosts
    pub escalations: u64,
    pub sla_boosts: u64,
    pub starvation_preventions: u64,
    pub rule_errors: u64,
    pub total_wait_ms: u64,
    pub total_run_ms: u64,
}

impl Analytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an admission and how long the task waited for it
    pub fn started(&mut self, wait_ms: u64) {
        self.tasks_started += 1;
        self.total_wait_ms = self.total_wait_ms.saturating_add(wait_ms);
    }

    /// Record a successful run
    pub fn completed(&mut self, run_ms: u64) {
        self.tasks_completed += 1;
        self.total_run_ms = self.total_run_ms.saturating_add(run_ms);
    }

    /// Record a failed attempt
    pub fn failed(&mut self, run_ms: u64) {
        self.tasks_failed += 1;
        self.total_run_ms = self.total_run_ms.saturating_add(run_ms);
    }

    pub fn average_wait_ms(&self) -> Option<f64> {
        (self.tasks_started > 0).then(|| self.total_wait_ms as f64 / self.tasks_started as f64)
    }

    pub fn average_run_ms(&self) -> Option<f64> {
        let finished = self.tasks_completed + self.tasks_failed;
        (finished > 0).then(|| self.total_run_ms as f64 / finished as f64)
    }

    /// Fraction of finished attempts that failed
    pub fn failure_rate(&self) -> Option<f64> {
        let finished = self.tasks_completed + self.tasks_failed;
        (finished > 0).then(|| self.tasks_failed as f64 / finished as f64)
    }
}

/// One queued task in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub priority: i64,
    pub lane: String,
    pub wait_ms: u64,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub total: usize,
    pub max_concurrent: usize,
    pub running: usize,
    pub available_slots: usize,
    pub by_status: BTreeMap<TaskStatus, usize>,
    /// Every configured lane, including empty ones
    pub by_lane: BTreeMap<String, usize>,
    /// Queued tasks in admission order
    pub queued: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationKind {
    IncreaseConcurrency,
    RaisePreemptionThreshold,
    InvestigateFailures,
}

/// Advisory tuning hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// Aggregated analytics plus recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub generated_at: DateTime<Utc>,
    pub analytics: Analytics,
    pub queue: QueueState,
    pub average_wait_ms: Option<f64>,
    pub average_run_ms: Option<f64>,
    pub failure_rate: Option<f64>,
    pub recommendations: Vec<Recommendation>,
}

impl SchedulerReport {
    pub fn build(generated_at: DateTime<Utc>, analytics: Analytics, queue: QueueState, config: &SchedulerConfig) -> Self {
        let recommendations = recommend(&analytics, config);
        Self {
            generated_at,
            average_wait_ms: analytics.average_wait_ms(),
            average_run_ms: analytics.average_run_ms(),
            failure_rate: analytics.failure_rate(),
            analytics,
            queue,
            recommendations,
        }
    }
}

/// Derive tuning hints from counters and thresholds.
pub fn recommend(analytics: &Analytics, config: &SchedulerConfig) -> Vec<Recommendation> {
    let thresholds = &config.analytics;
    let mut out = Vec::new();

    if analytics.starvation_preventions > thresholds.starvation_warn_threshold {
        out.push(Recommendation {
            kind: RecommendationKind::IncreaseConcurrency,
            message: format!(
                "increase maxConcurrent (currently {}): {} starvation events > threshold {}",
                config.max_concurrent, analytics.starvation_preventions, thresholds.starvation_warn_threshold
            ),
        });
    }

    if analytics.preemptions > thresholds.preemption_warn_threshold {
        out.push(Recommendation {
            kind: RecommendationKind::RaisePreemptionThreshold,
            message: format!(
                "raise preemption.minPriorityDifference (currently {}): {} preemptions > threshold {}",
                config.preemption.min_priority_difference, analytics.preemptions, thresholds.preemption_warn_threshold
            ),
        });
    }

    if let Some(rate) = analytics.failure_rate()
        && rate > thresholds.failure_rate_warn
    {
        out.push(Recommendation {
            kind: RecommendationKind::InvestigateFailures,
            message: format!(
                "investigate failing tasks: failure rate {:.0}% > {:.0}%",
                rate * 100.0,
                thresholds.failure_rate_warn * 100.0
            ),
        });
    }

    out
}
