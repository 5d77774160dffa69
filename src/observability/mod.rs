//! Logs, metrics and request spans for the daemon.
//!
//! # Data Flow
//! ```text
//! Supervisor, gate and fetcher emit:
//!     → logging.rs (structured log events)
//!     → metrics.rs (ObservabilitySink: phases, in-flight samples, drain time)
//!     → tracing.rs (per-request spans with request IDs)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - JSON log output selectable for machine parsing
//! - The sink is a trait so the daemon never depends on a metrics backend

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::metrics::{MetricsSink, NoopSink, ObservabilitySink};
pub use self::tracing::RequestSpan;
