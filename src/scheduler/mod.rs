//! Priority-based admission scheduling.
//!
//! This module provides:
//! - **Rules and priority**: category tiers plus caller-registered adjustments
//! - **Lanes**: named priority bands for reporting
//! - **Aging**: age escalation, SLA boosts and starvation prevention
//! - **Preemption**: high-priority arrivals may evict running tasks
//! - **Feedback**: failures raise priority, later successes lower it again
//! - **PriorityScheduler**: the component that owns the tasks and ties it all together
//!
//! # Example
//!
//! ```ignore
//! use triagr::config::SchedulerConfig;
//! use triagr::domain::TaskDetails;
//! use triagr::scheduler::PriorityScheduler;
//!
//! let mut scheduler = PriorityScheduler::new(SchedulerConfig::default())?;
//! scheduler.add_task(TaskDetails::new("issue-42", "bug", chrono::Utc::now()))?;
//! let report = scheduler.tick();
//! ```

mod aging;
mod analytics;
mod engine;
mod feedback;
mod lanes;
mod preemption;
mod priority;
mod rules;
mod store;

pub use aging::{AgingEffect, AgingEngine, AgingReport};
pub use analytics::{
    Analytics, QueueEntry, QueueState, Recommendation, RecommendationKind, SchedulerReport, recommend,
};
pub use engine::{AdmissionReport, CompletedTask, PriorityScheduler, TickReport};
pub use feedback::FeedbackAdjuster;
pub use lanes::{Lane, LaneClassifier};
pub use preemption::{PreemptionController, ResumedTask};
pub use priority::{InitialPriority, PriorityCalculator};
pub use rules::{Rule, RuleEngine, RuleFn, RuleOutcome, assignee_rule, label_rule, mention_rule, repository_rule};
pub use store::TaskStore;
