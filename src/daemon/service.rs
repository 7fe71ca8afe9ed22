//! Shared, async access to a `PriorityScheduler`.
//!
//! Every call takes the one lock, so lifecycle operations and ticks are
//! serialized. Snapshot getters return owned clones.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, broadcast};

use crate::config::SchedulerConfig;
use crate::domain::{SchedulerEvent, Task, TaskDetails};
use crate::error::Result;
use crate::scheduler::{CompletedTask, PriorityScheduler, QueueState, ResumedTask, SchedulerReport, TickReport};

#[derive(Clone)]
pub struct SchedulerService {
    inner: Arc<Mutex<PriorityScheduler>>,
    ticking: Arc<AtomicBool>,
}

/// Clears the tick flag even if the tick future is dropped.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SchedulerService {
    pub fn new(scheduler: PriorityScheduler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(scheduler)),
            ticking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one tick unless another is already in progress.
    pub async fn try_tick(&self) -> Option<TickReport> {
        if self.ticking.swap(true, Ordering::AcqRel) {
            tracing::debug!("Tick already in progress, skipping");
            return None;
        }
        let _guard = TickGuard(&self.ticking);
        let mut scheduler = self.inner.lock().await;
        Some(scheduler.tick())
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::Acquire)
    }

    /// Run `f` with exclusive access.
    pub async fn with_scheduler<R>(&self, f: impl FnOnce(&mut PriorityScheduler) -> R) -> R {
        let mut scheduler = self.inner.lock().await;
        f(&mut scheduler)
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.lock().await.subscribe()
    }

    pub async fn add_task(&self, details: TaskDetails) -> Result<Task> {
        self.inner.lock().await.add_task(details)
    }

    pub async fn complete_task(&self, id: &str, result: Value) -> Option<CompletedTask> {
        self.inner.lock().await.complete_task(id, result)
    }

    pub async fn fail_task(&self, id: &str, error: &str) -> Option<Task> {
        self.inner.lock().await.fail_task(id, error)
    }

    pub async fn preempt_task(&self, id: &str, state: Option<Value>) -> bool {
        self.inner.lock().await.preempt_task(id, state)
    }

    pub async fn resume_preempted_task(&self, id: &str) -> Result<Option<ResumedTask>> {
        self.inner.lock().await.resume_preempted_task(id)
    }

    pub async fn remove_task(&self, id: &str) -> Option<Task> {
        self.inner.lock().await.remove_task(id)
    }

    pub async fn update_config(&self, config: SchedulerConfig) -> Result<()> {
        self.inner.lock().await.update_config(config)
    }

    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.inner.lock().await.get_task(id).cloned()
    }

    pub async fn running_count(&self) -> usize {
        self.inner.lock().await.running_count()
    }

    pub async fn queue_state(&self) -> QueueState {
        self.inner.lock().await.queue_state()
    }

    pub async fn generate_report(&self) -> SchedulerReport {
        self.inner.lock().await.generate_report()
    }
}
