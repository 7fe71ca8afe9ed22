//! Tick Loop - periodic scheduling driver
//!
//! Runs `SchedulerService::try_tick` on a fixed interval until shutdown is
//! requested. Missed ticks are skipped rather than burst.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerConfig;
use crate::daemon::service::SchedulerService;

/// Configuration for the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    /// Interval between ticks
    pub tick_interval: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
        }
    }
}

impl TickConfig {
    pub fn new(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(Duration::from_millis(config.tick_interval_ms.max(1)))
    }
}

/// Handle to a running tick loop.
pub struct TickHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<u64>,
}

impl TickHandle {
    /// Ask the loop to stop after the current tick.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the loop and wait for it. Returns how many ticks ran.
    pub async fn shutdown(self) -> u64 {
        self.request_shutdown();
        self.join.await.unwrap_or(0)
    }
}

/// Spawn the tick loop on the current runtime.
pub fn spawn_tick_loop(service: SchedulerService, config: TickConfig) -> TickHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(tick_loop(service, config, shutdown_rx));
    TickHandle { shutdown_tx, join }
}

async fn tick_loop(service: SchedulerService, config: TickConfig, mut shutdown_rx: watch::Receiver<bool>) -> u64 {
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;

    log::info!("Tick loop started, interval {:?}", config.tick_interval);
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // Handle dropped without an explicit shutdown
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = interval.tick() => {}
        }

        if let Some(report) = service.try_tick().await {
            ticks += 1;
            if !report.started.is_empty() || !report.preempted.is_empty() {
                log::debug!(
                    "Tick {}: started {:?}, preempted {:?}",
                    ticks,
                    report.started,
                    report.preempted
                );
            }
        }
    }

    log::info!("Tick loop stopped after {} ticks", ticks);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskDetails;
    use crate::scheduler::PriorityScheduler;

    #[test]
    fn test_tick_config_default() {
        assert_eq!(TickConfig::default().tick_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_tick_config_from_config() {
        let config = SchedulerConfig {
            tick_interval_ms: 250,
            ..SchedulerConfig::default()
        };
        assert_eq!(TickConfig::from_config(&config).tick_interval, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_tick_loop_admits_and_stops() {
        let scheduler = PriorityScheduler::new(SchedulerConfig::default()).unwrap();
        let service = SchedulerService::new(scheduler);
        service
            .add_task(TaskDetails::new("a", "bug", chrono::Utc::now()))
            .await
            .unwrap();

        let handle = spawn_tick_loop(service.clone(), TickConfig::new(Duration::from_millis(5)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let ticks = handle.shutdown().await;

        assert!(ticks >= 1);
        assert_eq!(service.running_count().await, 1);
    }
}
