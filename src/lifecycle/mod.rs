//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Drain (manager.rs):
//!     start_drain() → cancel drain signal → main action unwinds
//!     → drain hook raced against timeout → return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → start_drain() (repeats absorbed)
//!
//! Quiescence (quiescence.rs):
//!     daemon drained → quiescence completed → waiters released
//! ```
//!
//! # Design Decisions
//! - One drain signal per process, cancelled at most once
//! - Shutdown has timeout: drain is abandoned after the deadline

pub mod manager;
pub mod quiescence;
pub mod signals;

pub use manager::{linked_child, DrainOutcome, LifecycleManager, LinkedToken, ManagedError};
pub use quiescence::QuiescenceMonitor;
