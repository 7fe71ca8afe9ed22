//! Event bus for scheduler notifications.
//!
//! Two delivery paths share one publish call:
//! - a tokio broadcast channel for async consumers (`subscribe`)
//! - registered observer callbacks, run synchronously in publish order

use std::fmt;

use tokio::sync::broadcast;

use crate::domain::SchedulerEvent;

const DEFAULT_CAPACITY: usize = 1024;

type Observer = Box<dyn Fn(&SchedulerEvent) + Send>;

pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
    observers: Vec<Observer>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus whose channel buffers `capacity` events per lagging receiver.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            observers: Vec::new(),
        }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }

    /// Register a synchronous callback.
    pub fn observe<F>(&mut self, observer: F)
    where
        F: Fn(&SchedulerEvent) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn publish(&self, event: SchedulerEvent) {
        tracing::trace!(event_type = event.event_type(), task_id = ?event.task_id(), "Publishing event");
        for observer in &self.observers {
            observer(&event);
        }
        // No receivers is fine; events are best-effort notifications
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.tx.receiver_count())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn preempted(id: &str) -> SchedulerEvent {
        SchedulerEvent::TaskPreempted { task_id: id.to_string() }
    }

    #[test]
    fn test_publish_without_receivers() {
        let bus = EventBus::new();
        bus.publish(preempted("t1"));
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(preempted("a"));
        bus.publish(preempted("b"));

        assert_eq!(rx.try_recv().unwrap(), preempted("a"));
        assert_eq!(rx.try_recv().unwrap(), preempted("b"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_observer_called_synchronously() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut bus = EventBus::new();
        bus.observe(move |event| sink.lock().unwrap().push(event.event_type()));
        bus.publish(preempted("a"));

        assert_eq!(*seen.lock().unwrap(), vec!["task-preempted"]);
    }
}
