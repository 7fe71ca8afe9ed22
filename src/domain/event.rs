//! Lifecycle events published by the scheduler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type constants
pub mod event_types {
    pub const TASK_QUEUED: &str = "task-queued";
    pub const TASK_STARTED: &str = "task-started";
    pub const TASK_COMPLETED: &str = "task-completed";
    pub const TASK_FAILED: &str = "task-failed";
    pub const TASK_PREEMPTED: &str = "task-preempted";
    pub const TASK_RESUMED: &str = "task-resumed";
    pub const PRIORITY_CHANGED: &str = "priority-changed";
    pub const ANALYTICS: &str = "analytics";
}

/// Typed scheduler event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchedulerEvent {
    TaskQueued {
        task_id: String,
        priority: i64,
        lane: String,
    },
    TaskStarted {
        task_id: String,
        priority: i64,
        wait_time_ms: u64,
    },
    TaskCompleted {
        task_id: String,
        duration_ms: u64,
        result: Value,
    },
    TaskFailed {
        task_id: String,
        error: String,
        attempts: u32,
    },
    TaskPreempted {
        task_id: String,
    },
    TaskResumed {
        task_id: String,
        preemption_duration_ms: u64,
        state: Option<Value>,
    },
    PriorityChanged {
        task_id: String,
        priority: i64,
    },
    Analytics {
        escalations: u64,
        starvation_preventions: u64,
    },
}

impl SchedulerEvent {
    /// The wire name of this event
    pub fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskQueued { .. } => event_types::TASK_QUEUED,
            SchedulerEvent::TaskStarted { .. } => event_types::TASK_STARTED,
            SchedulerEvent::TaskCompleted { .. } => event_types::TASK_COMPLETED,
            SchedulerEvent::TaskFailed { .. } => event_types::TASK_FAILED,
            SchedulerEvent::TaskPreempted { .. } => event_types::TASK_PREEMPTED,
            SchedulerEvent::TaskResumed { .. } => event_types::TASK_RESUMED,
            SchedulerEvent::PriorityChanged { .. } => event_types::PRIORITY_CHANGED,
            SchedulerEvent::Analytics { .. } => event_types::ANALYTICS,
        }
    }

    /// The task this event concerns, if any
    pub fn task_id(&self) -> Option<&str> {
        match self {
            SchedulerEvent::TaskQueued { task_id, .. }
            | SchedulerEvent::TaskStarted { task_id, .. }
            | SchedulerEvent::TaskCompleted { task_id, .. }
            | SchedulerEvent::TaskFailed { task_id, .. }
            | SchedulerEvent::TaskPreempted { task_id }
            | SchedulerEvent::TaskResumed { task_id, .. }
            | SchedulerEvent::PriorityChanged { task_id, .. } => Some(task_id.as_str()),
            SchedulerEvent::Analytics { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = SchedulerEvent::TaskPreempted {
            task_id: "t1".to_string(),
        };
        assert_eq!(event.event_type(), "task-preempted");
        assert_eq!(event.task_id(), Some("t1"));
    }

    #[test]
    fn test_analytics_has_no_task() {
        let event = SchedulerEvent::Analytics {
            escalations: 2,
            starvation_preventions: 1,
        };
        assert_eq!(event.task_id(), None);
    }

    #[test]
    fn test_serialized_tag_matches_event_type() {
        let event = SchedulerEvent::PriorityChanged {
            task_id: "t1".to_string(),
            priority: 310,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "priority-changed");
        assert_eq!(json["priority"], 310);
    }
}
