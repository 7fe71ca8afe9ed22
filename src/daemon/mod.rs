//! Daemon Core - hosting the scheduler in an async runtime
//!
//! - `SchedulerService` serializes access to one `PriorityScheduler`
//! - the tick loop drives `try_tick` on the configured interval

pub mod service;
pub mod tick;

pub use service::SchedulerService;
pub use tick::{TickConfig, TickHandle, spawn_tick_loop};
