//! Triagr - priority-based admission scheduling
//!
//! Triagr decides which queued work items run next under a global
//! concurrency limit. Priorities come from category tiers and rules, grow
//! with age and SLA pressure, and react to execution outcomes.

pub mod clock;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod events;
pub mod executor;
pub mod id;
pub mod scheduler;

pub use error::{Result, TriagrError};
