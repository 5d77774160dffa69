//! Service health publisher.
//!
//! # Responsibilities
//! - Hold the single current health status (default NotServing)
//! - Notify subscribers synchronously on every change
//! - Force NotServing on drain so external checks fail before work finishes
//!
//! # Design Decisions
//! - Status mirrored into an atomic for lock-free reads on the request path
//! - Notifications run under the publisher lock: delivery order = call order
//! - New subscribers receive the current status immediately

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Health status exposed to admission and external health checks.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Unknown = 0,
    Serving = 1,
    NotServing = 2,
}

impl From<u8> for HealthStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthStatus::Serving,
            2 => HealthStatus::NotServing,
            _ => HealthStatus::Unknown,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "UNKNOWN",
            HealthStatus::Serving => "SERVING",
            HealthStatus::NotServing => "NOT_SERVING",
        };
        f.write_str(s)
    }
}

/// Receives health changes.
///
/// Called while the publisher lock is held: implementations must not call
/// back into the publisher.
pub trait HealthSubscriber: Send + Sync {
    fn on_health_update(&self, status: HealthStatus);
}

impl<F> HealthSubscriber for F
where
    F: Fn(HealthStatus) + Send + Sync,
{
    fn on_health_update(&self, status: HealthStatus) {
        self(status)
    }
}

/// Handle returned by [`HealthPublisher::add_subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriberId, Arc<dyn HealthSubscriber>)>,
}

pub struct HealthPublisher {
    status: AtomicU8,
    subscribers: Mutex<Subscribers>,
}

impl HealthPublisher {
    /// Publisher starting at `NotServing`.
    pub fn new() -> Self {
        Self::with_status(HealthStatus::NotServing)
    }

    /// Publisher starting at `status`.
    pub fn with_status(status: HealthStatus) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    /// Current status. Lock-free.
    pub fn current_status(&self) -> HealthStatus {
        HealthStatus::from(self.status.load(Ordering::Acquire))
    }

    /// Lock-free check used on the request path.
    pub fn is_serving(&self) -> bool {
        self.current_status() == HealthStatus::Serving
    }

    /// Register a subscriber and deliver the current status to it.
    pub fn add_subscriber(&self, subscriber: Arc<dyn HealthSubscriber>) -> SubscriberId {
        let mut subs = self.subscribers.lock().expect("health publisher mutex poisoned");
        let id = SubscriberId(subs.next_id);
        subs.next_id += 1;
        subscriber.on_health_update(self.current_status());
        subs.entries.push((id, subscriber));
        id
    }

    /// Returns false when `id` was not registered.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock().expect("health publisher mutex poisoned");
        let before = subs.entries.len();
        subs.entries.retain(|(entry, _)| *entry != id);
        subs.entries.len() != before
    }

    /// Publish `status`; a no-op when unchanged.
    pub fn update_status(&self, status: HealthStatus) {
        let subs = self.subscribers.lock().expect("health publisher mutex poisoned");
        let previous = HealthStatus::from(self.status.load(Ordering::Acquire));
        if previous == status {
            return;
        }
        self.status.store(status as u8, Ordering::Release);

        tracing::info!(from = %previous, to = %status, "Health status changed");
        for (_, subscriber) in subs.entries.iter() {
            subscriber.on_health_update(status);
        }
    }

    /// Force NotServing ahead of draining in-flight work.
    pub fn drain(&self) {
        tracing::info!("Draining health publisher");
        self.update_status(HealthStatus::NotServing);
    }
}

impl Default for HealthPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<HealthStatus>>>, Arc<dyn HealthSubscriber>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscriber: Arc<dyn HealthSubscriber> =
            Arc::new(move |status: HealthStatus| sink.lock().unwrap().push(status));
        (seen, subscriber)
    }

    #[test]
    fn defaults_to_not_serving() {
        let publisher = HealthPublisher::new();
        assert_eq!(publisher.current_status(), HealthStatus::NotServing);
        assert!(!publisher.is_serving());
    }

    #[test]
    fn subscriber_gets_initial_status() {
        let publisher = HealthPublisher::with_status(HealthStatus::Unknown);
        let (seen, subscriber) = recorder();
        publisher.add_subscriber(subscriber);

        assert_eq!(*seen.lock().unwrap(), vec![HealthStatus::Unknown]);
    }

    #[test]
    fn repeated_update_notifies_once() {
        let publisher = HealthPublisher::with_status(HealthStatus::Unknown);
        let (seen, subscriber) = recorder();
        publisher.add_subscriber(subscriber);
        seen.lock().unwrap().clear();

        publisher.update_status(HealthStatus::Serving);
        publisher.update_status(HealthStatus::Serving);

        assert_eq!(*seen.lock().unwrap(), vec![HealthStatus::Serving]);
    }

    #[test]
    fn observes_distinct_values_in_call_order() {
        let publisher = HealthPublisher::new();
        let (seen, subscriber) = recorder();
        publisher.add_subscriber(subscriber);

        let calls = [
            HealthStatus::Serving,
            HealthStatus::Serving,
            HealthStatus::NotServing,
            HealthStatus::Unknown,
            HealthStatus::Unknown,
            HealthStatus::Serving,
        ];
        for status in calls {
            publisher.update_status(status);
        }

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                HealthStatus::NotServing,
                HealthStatus::Serving,
                HealthStatus::NotServing,
                HealthStatus::Unknown,
                HealthStatus::Serving,
            ]
        );
    }

    #[test]
    fn removed_subscriber_stops_receiving() {
        let publisher = HealthPublisher::new();
        let (seen, subscriber) = recorder();
        let id = publisher.add_subscriber(subscriber);

        assert!(publisher.remove_subscriber(id));
        assert!(!publisher.remove_subscriber(id));
        publisher.update_status(HealthStatus::Serving);

        assert_eq!(*seen.lock().unwrap(), vec![HealthStatus::NotServing]);
    }

    #[test]
    fn drain_forces_not_serving() {
        let publisher = HealthPublisher::with_status(HealthStatus::Serving);
        publisher.drain();
        assert_eq!(publisher.current_status(), HealthStatus::NotServing);
    }
}
