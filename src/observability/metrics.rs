//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the daemon's observability sink (phases, in-flight, drain)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `fleetnode_daemon_phase` (gauge): ordinal of the current lifecycle phase
//! - `fleetnode_phase_transitions_total` (counter): transitions by phase
//! - `fleetnode_in_flight_requests` (gauge): admitted, unfinished requests
//! - `fleetnode_drain_duration_seconds` (histogram): time spent draining
//! - `fleetnode_requests_total` (counter): requests by operation, outcome
//! - `fleetnode_request_duration_seconds` (histogram): latency by operation
//! - `fleetnode_fetch_total` (counter): hot-property fetches by outcome
//!
//! # Design Decisions
//! - Sinks are fire-and-forget: no method blocks or returns an error
//! - Low-overhead metric updates (atomic operations)

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::status::DaemonPhase;

/// Receiver of lifecycle and load events.
///
/// Every method defaults to a no-op so collaborators only implement what
/// they consume.
pub trait ObservabilitySink: Send + Sync {
    fn phase_changed(&self, _phase: DaemonPhase) {}

    fn in_flight(&self, _count: usize) {}

    fn drain_completed(&self, _duration: Duration, _in_flight_at_start: usize) {}

    fn request_completed(&self, _operation: &str, _duration: Duration, _success: bool) {}

    fn fetch_completed(&self, _duration: Duration, _success: bool) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ObservabilitySink for NoopSink {}

/// Sink backed by the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

impl ObservabilitySink for MetricsSink {
    fn phase_changed(&self, phase: DaemonPhase) {
        metrics::gauge!("fleetnode_daemon_phase").set(phase.ordinal() as f64);
        metrics::counter!("fleetnode_phase_transitions_total", "phase" => phase.as_str()).increment(1);
    }

    fn in_flight(&self, count: usize) {
        metrics::gauge!("fleetnode_in_flight_requests").set(count as f64);
    }

    fn drain_completed(&self, duration: Duration, in_flight_at_start: usize) {
        metrics::histogram!("fleetnode_drain_duration_seconds").record(duration.as_secs_f64());
        metrics::gauge!("fleetnode_drain_in_flight_at_start").set(in_flight_at_start as f64);
    }

    fn request_completed(&self, operation: &str, duration: Duration, success: bool) {
        let operation = operation.to_string();
        metrics::counter!(
            "fleetnode_requests_total",
            "operation" => operation.clone(),
            "outcome" => outcome(success)
        )
        .increment(1);
        metrics::histogram!("fleetnode_request_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }

    fn fetch_completed(&self, duration: Duration, success: bool) {
        metrics::counter!("fleetnode_fetch_total", "outcome" => outcome(success)).increment(1);
        metrics::histogram!("fleetnode_fetch_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
