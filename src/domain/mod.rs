//! Domain types for Triagr
//!
//! This module contains the core domain types:
//! - Task: the scheduled record with priority components and lifecycle state
//! - TaskDetails: the normalized input record from ingestion
//! - SchedulerEvent: typed lifecycle notifications

pub mod details;
pub mod event;
pub mod task;

pub use details::TaskDetails;
pub use event::{SchedulerEvent, event_types};
pub use task::{HistoryEntry, SlaLevel, Task, TaskStatus};
