//! Health and lifecycle-phase reporting.
//!
//! # Data Flow
//! ```text
//! HealthProvider (provider.rs)
//!     → HealthCheck every check_interval
//!     → HealthPublisher::update_status (publisher.rs)
//!     → subscribers, ConcurrencyGate admission, HealthServer /health (server.rs)
//!
//! Supervisor startup and shutdown
//!     → StatusMonitor::advance (status.rs)
//!     → ObservabilitySink::phase_changed
//! ```
//!
//! # Design Decisions
//! - One publisher per process, passed explicitly
//! - Health defaults to NotServing until the first check passes
//! - Drain forces NotServing before in-flight work is waited on

pub mod provider;
pub mod publisher;
pub mod server;
pub mod status;

pub use provider::{AlwaysHealthy, HealthCheck, HealthProvider};
pub use publisher::{HealthPublisher, HealthStatus, HealthSubscriber, SubscriberId};
pub use server::HealthServer;
pub use status::{DaemonPhase, StatusMonitor};
