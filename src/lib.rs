//! Control plane of a fleet-node daemon.
//!
//! Starts a bounded set of interdependent subsystems in readiness order,
//! gates inbound requests on health and saturation, turns any subsystem
//! failure into a coordinated shutdown, and drains in bounded time.

pub mod admission;
pub mod config;
pub mod fetcher;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod supervisor;

pub use admission::ConcurrencyGate;
pub use config::DaemonConfig;
pub use health::{DaemonPhase, HealthPublisher, HealthStatus, StatusMonitor};
pub use lifecycle::LifecycleManager;
pub use supervisor::{DaemonError, SubsystemSupervisor};
