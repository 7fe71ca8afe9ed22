//! Authoritative task records and scheduling indices.
//!
//! The store keeps three structures in lockstep:
//! - `tasks`: every live record by id
//! - `queue`: Queued tasks ordered by (priority desc, created_at asc, id)
//! - `running`: ids of Running tasks
//!
//! All mutation goes through [`TaskStore::update`], which unindexes a record,
//! applies the change and reindexes it, so a status change and the running
//! count can never disagree.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskStatus};
use crate::error::{Result, TriagrError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<i64>,
    created_at: DateTime<Utc>,
    id: String,
}

impl QueueKey {
    fn of(task: &Task) -> Self {
        Self {
            priority: Reverse(task.priority),
            created_at: task.created_at,
            id: task.id.clone(),
        }
    }
}

/// In-memory task store.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<String, Task>,
    queue: BTreeSet<QueueKey>,
    running: BTreeSet<String>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails if a live record with the same id exists.
    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(TriagrError::DuplicateTask(task.id));
        }
        self.index(&task);
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Mutate a record and keep the indices consistent.
    ///
    /// The closure must not change `task.id`.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        let mut task = self.tasks.remove(id)?;
        self.unindex(&task);
        let result = f(&mut task);
        debug_assert_eq!(task.id, id, "update must not change the task id");
        self.index(&task);
        self.tasks.insert(task.id.clone(), task);
        Some(result)
    }

    /// Remove a record entirely.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        self.unindex(&task);
        Some(task)
    }

    /// The highest-ranked Queued task.
    pub fn peek_queued(&self) -> Option<&Task> {
        self.queue.first().and_then(|key| self.tasks.get(&key.id))
    }

    /// Queued tasks in rank order.
    pub fn queued(&self) -> impl Iterator<Item = &Task> {
        self.queue.iter().filter_map(|key| self.tasks.get(&key.id))
    }

    /// Ids of Queued tasks in rank order.
    pub fn queued_ids(&self) -> Vec<String> {
        self.queue.iter().map(|key| key.id.clone()).collect()
    }

    /// Running tasks, ordered by id.
    pub fn running(&self) -> impl Iterator<Item = &Task> {
        self.running.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Every live record, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn index(&mut self, task: &Task) {
        if task.status == TaskStatus::Queued {
            self.queue.insert(QueueKey::of(task));
        } else if task.status.holds_slot() {
            self.running.insert(task.id.clone());
        }
    }

    fn unindex(&mut self, task: &Task) {
        self.queue.remove(&QueueKey::of(task));
        self.running.remove(&task.id);
    }
}
