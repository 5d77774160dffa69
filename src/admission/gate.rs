//! Request admission with bounded concurrency.
//!
//! # Responsibilities
//! - Reject immediately when paused or not Serving (no capacity consumed)
//! - Enforce the in-flight limit via semaphore (callers wait for a slot)
//! - Track and publish the in-flight count on every admit and completion
//! - Map handler faults to a generic internal outcome
//! - Drain: reacquire the full capacity, proving zero work remains
//!
//! # Design Decisions
//! - Pause and health checks are lock-free reads
//! - The in-flight guard releases its slot only after decrementing, so a
//!   drain can never complete while the count is non-zero
//! - Count samples are published under a short lock to keep them ordered;
//!   handlers never run while it is held

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, Semaphore, SemaphorePermit};
use tracing::Instrument;

use crate::admission::status::{HandlerError, RequestStatus};
use crate::config::LoadConfig;
use crate::health::publisher::HealthPublisher;
use crate::observability::{ObservabilitySink, RequestSpan};

/// Admission gate placed in front of every request handler.
pub struct ConcurrencyGate {
    capacity: usize,
    slots: Semaphore,
    paused: AtomicBool,
    in_flight: AtomicUsize,
    watchers: Mutex<Vec<mpsc::UnboundedSender<usize>>>,
    health: Arc<HealthPublisher>,
    sink: Arc<dyn ObservabilitySink>,
}

impl ConcurrencyGate {
    /// Gate admitting at most `capacity` concurrent requests.
    pub fn new(
        capacity: usize,
        health: Arc<HealthPublisher>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        sink.in_flight(0);
        Self {
            capacity,
            slots: Semaphore::new(capacity),
            paused: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            watchers: Mutex::new(Vec::new()),
            health,
            sink,
        }
    }

    /// Gate sized by `max_concurrent_requests`.
    pub fn from_config(
        config: &LoadConfig,
        health: Arc<HealthPublisher>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self::new(config.max_concurrent_requests, health, sink)
    }

    /// Requests admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Slots free right now.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Pause or resume admission. Admitted requests are unaffected.
    pub fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::SeqCst) != paused {
            tracing::info!(paused, "Admission pause changed");
        }
    }

    /// True while admission is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stream of in-flight counts, one sample per admit and per completion.
    pub fn subscribe_in_flight(&self) -> mpsc::UnboundedReceiver<usize> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_watchers().push(tx);
        rx
    }

    /// Admit `request` and run `handler` on it.
    ///
    /// Waits for a free slot when saturated; drop the returned future to stop
    /// waiting.
    pub async fn handle<Req, Resp, F, Fut>(
        &self,
        request: Req,
        handler: F,
        operation: &str,
    ) -> Result<Resp, RequestStatus>
    where
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, HandlerError>>,
    {
        if self.is_paused() {
            tracing::debug!(operation, "Rejecting request: paused");
            return Err(RequestStatus::unavailable("Service is paused"));
        }
        if !self.health.is_serving() {
            tracing::debug!(operation, "Rejecting request: not serving");
            return Err(RequestStatus::unavailable("Service is not healthy"));
        }

        let span = RequestSpan::start(operation, self.sink.clone());

        let permit = match self.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                span.end(false);
                return Err(RequestStatus::unavailable("Service is draining"));
            }
        };

        let guard = InFlightGuard::enter(self, permit);
        let result = handler(request).instrument(span.span().clone()).await;
        drop(guard);

        match result {
            Ok(response) => {
                span.end(true);
                Ok(response)
            }
            Err(HandlerError::Status(status)) => {
                span.end(false);
                Err(status)
            }
            Err(HandlerError::Fault(error)) => {
                tracing::error!(
                    operation,
                    request_id = %span.request_id(),
                    error = %error,
                    "Error handling request"
                );
                span.end(false);
                Err(RequestStatus::internal())
            }
        }
    }

    /// Wait until every slot is free, then keep them.
    ///
    /// Returns the in-flight count observed when the drain began. Once this
    /// returns the gate admits nothing further.
    pub async fn drain(&self) -> usize {
        let in_flight_at_start = self.in_flight();
        tracing::info!(in_flight = in_flight_at_start, "Draining admission gate");

        let permits = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        match self.slots.acquire_many(permits).await {
            Ok(all) => {
                all.forget();
                self.slots.close();
                debug_assert_eq!(self.in_flight(), 0);
                tracing::info!("Admission gate drained");
            }
            Err(_) => tracing::debug!("Admission gate already drained"),
        }
        in_flight_at_start
    }

    fn lock_watchers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<usize>>> {
        self.watchers.lock().expect("in-flight watchers mutex poisoned")
    }

    fn record(&self, admitted: bool) {
        let mut watchers = self.lock_watchers();
        let count = if admitted {
            self.in_flight.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1
        };
        watchers.retain(|tx| tx.send(count).is_ok());
        self.sink.in_flight(count);
    }
}

/// Holds one slot for the duration of a handler call.
struct InFlightGuard<'a> {
    gate: &'a ConcurrencyGate,
    _permit: SemaphorePermit<'a>,
}

impl<'a> InFlightGuard<'a> {
    fn enter(gate: &'a ConcurrencyGate, permit: SemaphorePermit<'a>) -> Self {
        gate.record(true);
        Self {
            gate,
            _permit: permit,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Runs before `_permit` is released.
        self.gate.record(false);
    }
}
