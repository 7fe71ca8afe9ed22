//! The external executor seam.
//!
//! The scheduler never runs work itself. It tells an [`Executor`] when a task
//! is admitted and asks it to halt a task it has decided to preempt; whatever
//! the executor returns from `halt` is kept and handed back on resume.

use serde_json::Value;

use crate::domain::Task;

pub trait Executor: Send {
    /// A task was admitted (or resumed). Must not block.
    fn start(&mut self, task: &Task);

    /// Stop a running task and return its resumable state, if any.
    fn halt(&mut self, task: &Task) -> Option<Value>;
}

/// Executor that does nothing; callers drive completion themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn start(&mut self, _task: &Task) {}

    fn halt(&mut self, _task: &Task) -> Option<Value> {
        None
    }
}
