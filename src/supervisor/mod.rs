//! Subsystem supervision.
//!
//! # Data Flow
//! ```text
//! SubsystemSupervisor::run (daemon.rs)
//!     → LifecycleManager::run_managed
//!     → ordered startup checks (identity.rs, collaborators.rs)
//!     → SupervisedTaskSet::spawn per subsystem (task_set.rs, task.rs)
//!     → first exit → shared token cancelled → join all
//!     → drain hook → DaemonDrained
//! ```
//!
//! # Design Decisions
//! - Subsystems share nothing but the cancellation token
//! - One failure cancels every sibling; the first failure phase wins
//! - Panics are contained per subsystem and treated as failures

pub mod collaborators;
pub mod daemon;
pub mod identity;
pub mod task;
pub mod task_set;

pub use collaborators::{
    AttestationProvider, AttestationSet, DaemonComponents, ServiceDiscovery, ServiceListener,
    SigningKeySource, WorkloadController,
};
pub use daemon::{DaemonError, SubsystemSupervisor};
pub use identity::{FileIdentityManager, Identity, IdentityError};
pub use task::{SubsystemError, SubsystemOutcome, SubsystemReport, SubsystemTask};
pub use task_set::SupervisedTaskSet;
