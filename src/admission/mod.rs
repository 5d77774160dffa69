//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → gate.rs: paused? not Serving? → UNAVAILABLE (no capacity used)
//!     → wait for a capacity slot (backpressure)
//!     → in-flight +1 → handler → in-flight -1 → slot released
//!     → status.rs: faults collapsed to INTERNAL, typed statuses pass through
//! ```
//!
//! # Design Decisions
//! - Capacity fixed at construction
//! - Drain reacquires the full capacity: drained means zero in flight

pub mod gate;
pub mod status;

pub use gate::ConcurrencyGate;
pub use status::{HandlerError, RequestStatus, StatusCode};
