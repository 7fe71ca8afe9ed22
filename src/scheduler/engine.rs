//! The priority scheduler.
//!
//! `PriorityScheduler` is the single owner of every task record and index.
//! All mutation goes through `&mut self`, so a host that needs concurrent
//! access wraps it in one lock (see `daemon::SchedulerService`).
//!
//! Each tick:
//! 1. Re-score Queued tasks (age, SLA, starvation)
//! 2. Admit the highest-priority Queued tasks while slots are free
//! 3. With no free slot, let the best-ranked Queued task whose category and
//!    priority gap allow it preempt a running one
//!
//! Steps 2-3 also run immediately whenever a slot is released.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::domain::{SchedulerEvent, Task, TaskDetails, TaskStatus};
use crate::error::{Result, TriagrError};
use crate::events::EventBus;
use crate::executor::{Executor, NoopExecutor};
use crate::id::elapsed_ms;
use crate::scheduler::aging::AgingEngine;
use crate::scheduler::analytics::{Analytics, QueueEntry, QueueState, SchedulerReport};
use crate::scheduler::feedback::FeedbackAdjuster;
use crate::scheduler::lanes::LaneClassifier;
use crate::scheduler::preemption::{PreemptionController, ResumedTask};
use crate::scheduler::priority::PriorityCalculator;
use crate::scheduler::rules::{Rule, RuleEngine};
use crate::scheduler::store::TaskStore;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub started: Vec<String>,
    pub preempted: Vec<String>,
    pub reprioritized: usize,
}

/// Admissions and evictions from one scheduling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionReport {
    pub started: Vec<String>,
    pub preempted: Vec<String>,
}

/// Final record of a successfully completed task.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub task: Task,
    pub duration_ms: u64,
    /// Corrective de-escalation applied because the task had failed before
    pub success_decrease: i64,
}

pub struct PriorityScheduler {
    config: SchedulerConfig,
    calculator: PriorityCalculator,
    lanes: LaneClassifier,
    rules: RuleEngine,
    aging: AgingEngine,
    preemption: PreemptionController,
    feedback: FeedbackAdjuster,
    store: TaskStore,
    analytics: Analytics,
    events: EventBus,
    executor: Box<dyn Executor>,
    clock: Arc<dyn Clock>,
}

impl PriorityScheduler {
    /// Create a scheduler from a validated configuration.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: PriorityCalculator::new(&config),
            lanes: LaneClassifier::new(&config.lanes),
            aging: AgingEngine::new(&config),
            preemption: PreemptionController::new(&config),
            feedback: FeedbackAdjuster::new(&config),
            config,
            rules: RuleEngine::new(),
            store: TaskStore::new(),
            analytics: Analytics::new(),
            events: EventBus::new(),
            executor: Box::new(NoopExecutor),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different executor.
    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Start with a prepared rule set.
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn lanes(&self) -> &LaneClassifier {
        &self.lanes
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    //=== Configuration ===

    /// Replace the configuration atomically.
    ///
    /// On error nothing changes. On success every live task takes its base
    /// priority from the new tier table and is repriced and reclassified.
    pub fn update_config(&mut self, config: SchedulerConfig) -> Result<()> {
        config.validate()?;
        let running = self.store.running_count();
        if config.max_concurrent < running {
            return Err(TriagrError::InvalidConfig(format!(
                "maxConcurrent {} is below the {} tasks currently running",
                config.max_concurrent, running
            )));
        }

        self.calculator = PriorityCalculator::new(&config);
        self.lanes = LaneClassifier::new(&config.lanes);
        self.aging = AgingEngine::new(&config);
        self.preemption = PreemptionController::new(&config);
        self.feedback = FeedbackAdjuster::new(&config);
        self.config = config;

        let ids: Vec<String> = self.store.iter().map(|t| t.id.clone()).collect();
        for id in ids {
            let changed = self
                .store
                .update(&id, |task| {
                    task.base_priority = self.calculator.base_priority(&task.category);
                    self.calculator.reprice(task, &self.lanes).map(|_| task.priority)
                })
                .flatten();
            if let Some(priority) = changed {
                self.events.publish(SchedulerEvent::PriorityChanged { task_id: id, priority });
            }
        }

        tracing::info!(max_concurrent = self.config.max_concurrent, "Scheduler config updated");
        let now = self.clock.now();
        self.schedule(now);
        Ok(())
    }

    //=== Rules ===

    pub fn add_rule<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&TaskDetails, i64) -> i64 + Send + Sync + 'static,
    {
        self.rules.add_rule(name, func);
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.add(rule);
    }

    pub fn remove_rule(&mut self, name: &str) -> bool {
        self.rules.remove_rule(name)
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    //=== Events ===

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn observe<F>(&mut self, observer: F)
    where
        F: Fn(&SchedulerEvent) + Send + 'static,
    {
        self.events.observe(observer);
    }

    //=== Lifecycle ===

    /// Score a new record and queue it.
    pub fn add_task(&mut self, details: TaskDetails) -> Result<Task> {
        if self.store.contains(&details.id) {
            return Err(TriagrError::DuplicateTask(details.id));
        }

        let now = self.clock.now();
        let initial = self.calculator.initial(&details, &self.rules);
        self.analytics.rule_errors += initial.rules.failed.len() as u64;

        let mut task = Task::from_details(details, initial.base_priority, initial.rules.sum, now);
        self.calculator.reprice(&mut task, &self.lanes);
        self.store.insert(task.clone())?;
        self.analytics.tasks_added += 1;

        tracing::info!(task_id = %task.id, priority = task.priority, lane = %task.lane, "Task queued");
        self.events.publish(SchedulerEvent::TaskQueued {
            task_id: task.id.clone(),
            priority: task.priority,
            lane: task.lane.clone(),
        });

        Ok(task)
    }

    /// Run one scheduling cycle.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        self.analytics.ticks += 1;

        let aging = self.aging.run(&mut self.store, &self.calculator, &self.lanes, now);
        for (task_id, priority) in &aging.changed {
            self.events.publish(SchedulerEvent::PriorityChanged {
                task_id: task_id.clone(),
                priority: *priority,
            });
        }

        self.analytics.escalations += aging.escalations();
        self.analytics.sla_boosts += aging.sla_boosts;
        self.analytics.starvation_preventions += aging.starvation_preventions;
        if aging.escalations() > 0 || aging.starvation_preventions > 0 {
            self.events.publish(SchedulerEvent::Analytics {
                escalations: self.analytics.escalations,
                starvation_preventions: self.analytics.starvation_preventions,
            });
        }

        let admission = self.schedule(now);
        TickReport {
            started: admission.started,
            preempted: admission.preempted,
            reprioritized: aging.changed.len(),
        }
    }

    /// Admit Queued tasks into free slots, preempting when allowed.
    fn schedule(&mut self, now: DateTime<Utc>) -> AdmissionReport {
        let mut report = AdmissionReport::default();

        loop {
            if self.available_slots() > 0 {
                let Some(candidate) = self.store.peek_queued() else {
                    break;
                };
                let candidate_id = candidate.id.clone();
                if !self.admit(&candidate_id, now) {
                    break;
                }
                report.started.push(candidate_id);
                continue;
            }

            let Some((candidate_id, victim_id)) = self.next_preemption() else {
                break;
            };
            let state = match self.store.get(&victim_id) {
                Some(victim) => self.executor.halt(victim),
                None => break,
            };
            if !self.preemption.preempt(&mut self.store, &victim_id, state, now) {
                break;
            }
            tracing::info!(task_id = %victim_id, by = %candidate_id, "Task preempted");
            self.analytics.preemptions += 1;
            self.events.publish(SchedulerEvent::TaskPreempted {
                task_id: victim_id.clone(),
            });
            report.preempted.push(victim_id);

            if !self.admit(&candidate_id, now) {
                break;
            }
            report.started.push(candidate_id);
        }

        report
    }

    /// The best-ranked Queued task allowed to preempt, with its victim.
    ///
    /// A higher-ranked task whose category may not preempt does not block a
    /// lower-ranked one that may.
    fn next_preemption(&self) -> Option<(String, String)> {
        self.store
            .queued()
            .filter(|candidate| self.preemption.can_preempt(candidate, &self.store))
            .find_map(|candidate| {
                self.preemption
                    .select_victim(candidate, &self.store)
                    .map(|victim| (candidate.id.clone(), victim))
            })
    }

    /// Queued -> Running.
    fn admit(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        if self.available_slots() == 0 {
            return false;
        }
        let admitted = self.store.update(id, |task| {
            if task.status != TaskStatus::Queued {
                return None;
            }
            task.transition(TaskStatus::Running, now, None);
            task.started_at = Some(now);
            Some((elapsed_ms(task.wait_start, now), task.clone()))
        });

        let Some(Some((wait_ms, task))) = admitted else {
            return false;
        };

        self.analytics.started(wait_ms);
        self.executor.start(&task);
        tracing::info!(task_id = %id, priority = task.priority, wait_ms, "Task started");
        self.events.publish(SchedulerEvent::TaskStarted {
            task_id: id.to_string(),
            priority: task.priority,
            wait_time_ms: wait_ms,
        });
        true
    }

    /// Running -> Completed; the record leaves the store.
    ///
    /// Returns None if the task is not Running.
    pub fn complete_task(&mut self, id: &str, result: Value) -> Option<CompletedTask> {
        if self.store.get(id)?.status != TaskStatus::Running {
            return None;
        }
        let now = self.clock.now();

        let success_decrease = self
            .store
            .update(id, |task| {
                let decrease = self.feedback.apply_success(task);
                self.calculator.reprice(task, &self.lanes);
                task.transition(TaskStatus::Completed, now, None);
                decrease
            })
            .unwrap_or(0);
        let task = self.store.remove(id)?;
        let duration_ms = task.started_at.map(|started| elapsed_ms(started, now)).unwrap_or(0);

        self.analytics.completed(duration_ms);
        tracing::info!(task_id = %id, duration_ms, attempts = task.attempts, "Task completed");
        self.events.publish(SchedulerEvent::TaskCompleted {
            task_id: id.to_string(),
            duration_ms,
            result,
        });

        self.schedule(now);
        Some(CompletedTask {
            task,
            duration_ms,
            success_decrease,
        })
    }

    /// Running -> Queued with a failed attempt recorded.
    ///
    /// Retries are unlimited here; the caller decides when to `remove_task`.
    /// Returns None if the task is not Running.
    pub fn fail_task(&mut self, id: &str, error: &str) -> Option<Task> {
        if self.store.get(id)?.status != TaskStatus::Running {
            return None;
        }
        let now = self.clock.now();

        let (task, run_ms, changed) = self.store.update(id, |task| {
            let run_ms = task.started_at.map(|started| elapsed_ms(started, now)).unwrap_or(0);
            self.feedback.apply_failure(task, error, now);
            let changed = self.calculator.reprice(task, &self.lanes).is_some();
            (task.clone(), run_ms, changed)
        })?;

        self.analytics.failed(run_ms);
        tracing::warn!(task_id = %id, attempts = task.attempts, error = %error, "Task failed, requeued");
        self.events.publish(SchedulerEvent::TaskFailed {
            task_id: id.to_string(),
            error: error.to_string(),
            attempts: task.attempts,
        });
        if changed {
            self.events.publish(SchedulerEvent::PriorityChanged {
                task_id: id.to_string(),
                priority: task.priority,
            });
        }

        self.schedule(now);
        Some(task)
    }

    /// Running -> Preempted with caller-supplied state.
    ///
    /// Returns false without side effects if the task is not Running.
    pub fn preempt_task(&mut self, id: &str, state: Option<Value>) -> bool {
        let now = self.clock.now();
        if !self.preemption.preempt(&mut self.store, id, state, now) {
            return false;
        }

        self.analytics.preemptions += 1;
        tracing::info!(task_id = %id, "Task preempted by caller");
        self.events.publish(SchedulerEvent::TaskPreempted { task_id: id.to_string() });

        self.schedule(now);
        true
    }

    /// Preempted -> Running, bypassing the queue.
    ///
    /// `Ok(None)` if the task is unknown or not Preempted (no side effects);
    /// `Err(NoCapacity)` if every slot is taken.
    pub fn resume_preempted_task(&mut self, id: &str) -> Result<Option<ResumedTask>> {
        match self.store.get(id) {
            Some(task) if task.status == TaskStatus::Preempted => {}
            _ => return Ok(None),
        }
        if self.available_slots() == 0 {
            return Err(TriagrError::NoCapacity {
                running: self.store.running_count(),
                max: self.config.max_concurrent,
            });
        }

        let now = self.clock.now();
        let Some(resumed) = self.preemption.resume(&mut self.store, id, now) else {
            return Ok(None);
        };

        self.analytics.resumes += 1;
        self.executor.start(&resumed.task);
        tracing::info!(task_id = %id, preemption_duration_ms = resumed.preemption_duration_ms, "Task resumed");
        self.events.publish(SchedulerEvent::TaskResumed {
            task_id: id.to_string(),
            preemption_duration_ms: resumed.preemption_duration_ms,
            state: resumed.state.clone(),
        });

        Ok(Some(resumed))
    }

    /// Drop a record in any state. Frees its slot if it was Running.
    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        let task = self.store.remove(id)?;
        self.analytics.tasks_removed += 1;
        tracing::info!(task_id = %id, status = %task.status, "Task removed");

        if task.status == TaskStatus::Running {
            let now = self.clock.now();
            self.schedule(now);
        }
        Some(task)
    }

    //=== Queries ===

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.store.get(id)
    }

    /// Queued tasks in admission order.
    pub fn queued_tasks(&self) -> Vec<&Task> {
        self.store.queued().collect()
    }

    pub fn running_tasks(&self) -> Vec<&Task> {
        self.store.running().collect()
    }

    /// Preempted tasks, highest priority first, then longest preempted.
    pub fn preempted_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .store
            .iter()
            .filter(|task| task.status == TaskStatus::Preempted)
            .collect();
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.preempted_at.cmp(&b.preempted_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        tasks
    }

    pub fn running_count(&self) -> usize {
        self.store.running_count()
    }

    pub fn available_slots(&self) -> usize {
        self.config.max_concurrent.saturating_sub(self.store.running_count())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Counts per status and lane plus the ranked queue.
    pub fn queue_state(&self) -> QueueState {
        let now = self.clock.now();

        let mut by_status = std::collections::BTreeMap::new();
        let mut by_lane: std::collections::BTreeMap<String, usize> =
            self.lanes.names().map(|name| (name.to_string(), 0)).collect();
        for task in self.store.iter() {
            *by_status.entry(task.status).or_insert(0) += 1;
            *by_lane.entry(task.lane.clone()).or_insert(0) += 1;
        }

        let queued = self
            .store
            .queued()
            .map(|task| QueueEntry {
                id: task.id.clone(),
                priority: task.priority,
                lane: task.lane.clone(),
                wait_ms: elapsed_ms(task.wait_start, now),
            })
            .collect();

        QueueState {
            total: self.store.len(),
            max_concurrent: self.config.max_concurrent,
            running: self.store.running_count(),
            available_slots: self.available_slots(),
            by_status,
            by_lane,
            queued,
        }
    }

    /// Analytics, queue snapshot and recommendations.
    pub fn generate_report(&self) -> SchedulerReport {
        SchedulerReport::build(self.clock.now(), self.analytics.clone(), self.queue_state(), &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Mutex;

    fn setup(max_concurrent: usize) -> (PriorityScheduler, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let config = SchedulerConfig {
            max_concurrent,
            ..SchedulerConfig::default()
        };
        let scheduler = PriorityScheduler::new(config)
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (scheduler, clock)
    }

    fn details(id: &str, category: &str, clock: &ManualClock) -> TaskDetails {
        TaskDetails::new(id, category, clock.now())
    }

    /// Records every call so tests can see what the scheduler asked for.
    #[derive(Clone, Default)]
    struct RecordingExecutor {
        started: Arc<Mutex<Vec<String>>>,
        halted: Arc<Mutex<Vec<String>>>,
    }

    impl Executor for RecordingExecutor {
        fn start(&mut self, task: &Task) {
            self.started.lock().unwrap().push(task.id.clone());
        }

        fn halt(&mut self, task: &Task) -> Option<Value> {
            self.halted.lock().unwrap().push(task.id.clone());
            Some(json!({ "checkpoint": task.id }))
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SchedulerConfig {
            max_concurrent: 0,
            ..SchedulerConfig::default()
        };
        assert!(PriorityScheduler::new(config).is_err());
    }

    #[test]
    fn test_add_task_emits_queued() {
        let (mut scheduler, clock) = setup(2);
        let mut rx = scheduler.subscribe();

        let task = scheduler.add_task(details("a", "bug", &clock)).unwrap();
        assert_eq!(task.priority, 75);
        assert_eq!(task.lane, "normal");
        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerEvent::TaskQueued {
                task_id: "a".to_string(),
                priority: 75,
                lane: "normal".to_string()
            }
        );
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let (mut scheduler, clock) = setup(2);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        let err = scheduler.add_task(details("a", "misc", &clock)).unwrap_err();
        assert!(matches!(err, TriagrError::DuplicateTask(_)));
    }

    #[test]
    fn test_faulty_rule_counted_not_fatal() {
        let (mut scheduler, clock) = setup(2);
        scheduler.add_rule("broken", |_, _| panic!("nope"));
        scheduler.add_rule("plus-one", |_, _| 1);

        let task = scheduler.add_task(details("a", "bug", &clock)).unwrap();
        assert_eq!(task.priority, 76);
        assert_eq!(scheduler.analytics().rule_errors, 1);
    }

    #[test]
    fn test_tick_admits_by_priority_up_to_limit() {
        let (mut scheduler, clock) = setup(2);
        scheduler.add_task(details("misc", "misc", &clock)).unwrap();
        scheduler.add_task(details("bug", "bug", &clock)).unwrap();
        scheduler.add_task(details("feature", "feature", &clock)).unwrap();

        let report = scheduler.tick();
        assert_eq!(report.started, vec!["bug", "feature"]);
        assert_eq!(scheduler.running_count(), 2);
        assert_eq!(scheduler.queued_tasks()[0].id, "misc");
    }

    #[test]
    fn test_completion_frees_slot_immediately() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();
        scheduler.tick();

        clock.advance(Duration::seconds(90));
        let done = scheduler.complete_task("a", json!({"ok": true})).unwrap();
        assert_eq!(done.duration_ms, 90_000);
        assert_eq!(done.task.status, TaskStatus::Completed);
        assert!(scheduler.get_task("a").is_none());
        assert_eq!(scheduler.get_task("b").unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn test_complete_requires_running() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        assert!(scheduler.complete_task("a", Value::Null).is_none());
        assert!(scheduler.complete_task("ghost", Value::Null).is_none());
        assert!(scheduler.fail_task("a", "x").is_none());
        assert!(!scheduler.preempt_task("a", None));
        assert_eq!(scheduler.get_task("a").unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn test_fail_requeues_with_adjustment() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.tick();

        let mut rx = scheduler.subscribe();
        let task = scheduler.fail_task("a", "exit 2").unwrap();
        assert_eq!(task.attempts, 1);
        assert_eq!(task.dynamic_adjustment_total, 10);

        // The freed slot is refilled by the same task, now at 85
        assert_eq!(scheduler.get_task("a").unwrap().status, TaskStatus::Running);
        assert_eq!(scheduler.get_task("a").unwrap().priority, 85);

        let types: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(types, vec!["task-failed", "priority-changed", "task-started"]);
    }

    #[test]
    fn test_success_after_failure_decreases_adjustment() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.tick();
        scheduler.fail_task("a", "flaky").unwrap();
        scheduler.fail_task("a", "flaky").unwrap();

        let done = scheduler.complete_task("a", Value::Null).unwrap();
        assert_eq!(done.success_decrease, 5);
        assert_eq!(done.task.dynamic_adjustment_total, 15);
    }

    #[test]
    fn test_tick_preempts_for_urgent_arrival() {
        let (scheduler, clock) = setup(1);
        let executor = RecordingExecutor::default();
        let mut scheduler = scheduler.with_executor(Box::new(executor.clone()));

        scheduler.add_task(details("slow", "misc", &clock)).unwrap();
        scheduler.tick();
        scheduler.add_task(details("fire", "urgent", &clock)).unwrap();

        let report = scheduler.tick();
        assert_eq!(report.preempted, vec!["slow"]);
        assert_eq!(report.started, vec!["fire"]);
        assert_eq!(scheduler.running_count(), 1);

        let slow = scheduler.get_task("slow").unwrap();
        assert_eq!(slow.status, TaskStatus::Preempted);
        assert_eq!(slow.preempted_state, Some(json!({ "checkpoint": "slow" })));
        assert_eq!(*executor.halted.lock().unwrap(), vec!["slow"]);
        assert_eq!(*executor.started.lock().unwrap(), vec!["slow", "fire"]);
    }

    #[test]
    fn test_no_preemption_without_gap() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.tick();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();

        let report = scheduler.tick();
        assert!(report.preempted.is_empty());
        assert!(report.started.is_empty());
        assert_eq!(scheduler.get_task("b").unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn test_resume_after_slot_frees() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("slow", "misc", &clock)).unwrap();
        scheduler.tick();
        scheduler.add_task(details("fire", "urgent", &clock)).unwrap();
        scheduler.tick();

        let err = scheduler.resume_preempted_task("slow").unwrap_err();
        assert!(matches!(err, TriagrError::NoCapacity { running: 1, max: 1 }));
        assert_eq!(scheduler.get_task("slow").unwrap().status, TaskStatus::Preempted);

        clock.advance(Duration::minutes(10));
        scheduler.complete_task("fire", Value::Null).unwrap();

        let resumed = scheduler.resume_preempted_task("slow").unwrap().unwrap();
        assert_eq!(resumed.preemption_duration_ms, 600_000);
        assert_eq!(resumed.task.status, TaskStatus::Running);
        assert_eq!(scheduler.running_count(), 1);
    }

    #[test]
    fn test_resume_wrong_state_is_none() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        assert!(scheduler.resume_preempted_task("a").unwrap().is_none());
        assert!(scheduler.resume_preempted_task("ghost").unwrap().is_none());
    }

    #[test]
    fn test_remove_running_frees_slot() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();
        scheduler.tick();

        let removed = scheduler.remove_task("a").unwrap();
        assert_eq!(removed.id, "a");
        assert_eq!(scheduler.get_task("b").unwrap().status, TaskStatus::Running);
        assert!(scheduler.remove_task("a").is_none());
    }

    #[test]
    fn test_update_config_rejects_and_keeps_previous() {
        let (mut scheduler, _clock) = setup(2);
        let mut bad = SchedulerConfig::default();
        bad.lanes.insert("oops".to_string(), crate::config::LaneRange::new(10, Some(5)));

        assert!(scheduler.update_config(bad).is_err());
        assert_eq!(scheduler.config().max_concurrent, 2);
        assert!(scheduler.lanes().names().all(|n| n != "oops"));
    }

    #[test]
    fn test_update_config_refuses_shrink_below_running() {
        let (mut scheduler, clock) = setup(2);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();
        scheduler.tick();

        let smaller = SchedulerConfig {
            max_concurrent: 1,
            ..SchedulerConfig::default()
        };
        assert!(scheduler.update_config(smaller).is_err());
        assert_eq!(scheduler.config().max_concurrent, 2);
    }

    #[test]
    fn test_update_config_reclassifies_lanes() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();

        let mut config = SchedulerConfig::default();
        config.lanes.clear();
        config.lanes.insert("all".to_string(), crate::config::LaneRange::new(0, None));
        scheduler.update_config(config).unwrap();

        assert_eq!(scheduler.get_task("a").unwrap().lane, "all");
    }

    #[test]
    fn test_update_config_growth_admits() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();
        scheduler.tick();

        let bigger = SchedulerConfig {
            max_concurrent: 2,
            ..SchedulerConfig::default()
        };
        scheduler.update_config(bigger).unwrap();
        assert_eq!(scheduler.running_count(), 2);
    }

    #[test]
    fn test_queue_state_counts() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "misc", &clock)).unwrap();
        scheduler.tick();
        clock.advance(Duration::seconds(4));

        let state = scheduler.queue_state();
        assert_eq!(state.total, 2);
        assert_eq!(state.running, 1);
        assert_eq!(state.available_slots, 0);
        assert_eq!(state.by_status[&TaskStatus::Running], 1);
        assert_eq!(state.by_status[&TaskStatus::Queued], 1);
        assert_eq!(state.by_lane["normal"], 1);
        assert_eq!(state.by_lane["low"], 1);
        assert_eq!(state.by_lane["urgent"], 0);
        assert_eq!(state.queued[0].id, "b");
        assert_eq!(state.queued[0].wait_ms, 4000);
    }

    #[test]
    fn test_observer_sees_lifecycle() {
        let (mut scheduler, clock) = setup(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        scheduler.observe(move |e| sink.lock().unwrap().push(e.event_type()));

        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.tick();
        scheduler.complete_task("a", Value::Null).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["task-queued", "task-started", "task-completed"]);
    }

    #[test]
    fn test_preemption_not_blocked_by_disallowed_leader() {
        let clock = ManualClock::new(Utc::now());
        let mut config = SchedulerConfig {
            max_concurrent: 1,
            ..SchedulerConfig::default()
        };
        config.preemption.allowed_task_types = vec!["critical".to_string()];
        let mut scheduler = PriorityScheduler::new(config)
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        scheduler.add_rule("security-boost", |d, _| if d.has_label("security") { 1000 } else { 0 });

        scheduler.add_task(details("chore", "misc", &clock)).unwrap();
        scheduler.tick();
        scheduler
            .add_task(details("sec", "bug", &clock).with_labels(["security"]))
            .unwrap();
        scheduler.add_task(details("crit", "critical", &clock)).unwrap();
        assert_eq!(scheduler.queued_tasks()[0].id, "sec");

        let report = scheduler.tick();
        assert_eq!(report.preempted, vec!["chore"]);
        assert_eq!(report.started, vec!["crit"]);
        assert_eq!(scheduler.get_task("sec").unwrap().status, TaskStatus::Queued);
        assert_eq!(scheduler.running_count(), 1);
    }

    #[test]
    fn test_huge_rule_saturates() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_rule("huge", |_, _| i64::MAX);

        let task = scheduler.add_task(details("a", "bug", &clock)).unwrap();
        assert_eq!(task.priority, i64::MAX);
        assert_eq!(task.lane, "urgent");

        scheduler.tick();
        let task = scheduler.fail_task("a", "boom").unwrap();
        assert_eq!(task.priority, i64::MAX);
    }

    #[test]
    fn test_update_config_applies_new_tiers() {
        let (mut scheduler, clock) = setup(1);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        let mut rx = scheduler.subscribe();

        let mut config = SchedulerConfig::default();
        config.priority_levels.insert("bug".to_string(), 500);
        scheduler.update_config(config).unwrap();

        let task = scheduler.get_task("a").unwrap();
        assert_eq!(task.base_priority, 500);
        assert_eq!(task.priority, 500);
        assert_eq!(task.lane, "high");
        assert_eq!(
            rx.try_recv().unwrap(),
            SchedulerEvent::PriorityChanged {
                task_id: "a".to_string(),
                priority: 500
            }
        );
    }

    #[test]
    fn test_preempted_tasks_ordering() {
        let (mut scheduler, clock) = setup(2);
        scheduler.add_task(details("a", "bug", &clock)).unwrap();
        scheduler.add_task(details("b", "bug", &clock)).unwrap();
        scheduler.tick();

        assert!(scheduler.preempt_task("a", None));
        clock.advance(Duration::seconds(1));
        assert!(scheduler.preempt_task("b", None));

        let ids: Vec<&str> = scheduler.preempted_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(scheduler.running_count(), 0);
    }
}
