//! Daemon lifecycle phase tracking.
//!
//! # States
//! ```text
//! Starting → Initializing → WaitingForFirstAttestationFetch
//!     → WaitingForFirstKeyFetch → WaitingForFirstHotPropertyUpdate
//!     → WaitingForWorkloadRegistration
//!
//! Any of the above → <Subsystem>RunningFailed   (first failure wins)
//! Any of the above → DaemonExitingOnError       (fatal startup error)
//! Shutdown path    → DaemonDrained              (terminal)
//! ```
//!
//! # Design Decisions
//! - Phases are totally ordered and only ever advance
//! - Intermediate phases may be skipped
//! - Every accepted transition is reported to the observability sink

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::observability::ObservabilitySink;

/// Startup and operational milestones, in advancement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DaemonPhase {
    Starting,
    Initializing,
    WaitingForFirstAttestationFetch,
    WaitingForFirstKeyFetch,
    WaitingForFirstHotPropertyUpdate,
    WaitingForWorkloadRegistration,
    ServiceDiscoveryRunningFailed,
    ServiceListenerRunningFailed,
    WorkloadControllerRunningFailed,
    DaemonExitingOnError,
    DaemonDrained,
}

impl DaemonPhase {
    /// Name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonPhase::Starting => "starting",
            DaemonPhase::Initializing => "initializing",
            DaemonPhase::WaitingForFirstAttestationFetch => "waiting_for_first_attestation_fetch",
            DaemonPhase::WaitingForFirstKeyFetch => "waiting_for_first_key_fetch",
            DaemonPhase::WaitingForFirstHotPropertyUpdate => "waiting_for_first_hot_property_update",
            DaemonPhase::WaitingForWorkloadRegistration => "waiting_for_workload_registration",
            DaemonPhase::ServiceDiscoveryRunningFailed => "service_discovery_running_failed",
            DaemonPhase::ServiceListenerRunningFailed => "service_listener_running_failed",
            DaemonPhase::WorkloadControllerRunningFailed => "workload_controller_running_failed",
            DaemonPhase::DaemonExitingOnError => "daemon_exiting_on_error",
            DaemonPhase::DaemonDrained => "daemon_drained",
        }
    }

    /// Position in startup order.
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Failure phases attributed to a specific subsystem.
    pub fn is_subsystem_failure(&self) -> bool {
        matches!(
            self,
            DaemonPhase::ServiceDiscoveryRunningFailed
                | DaemonPhase::ServiceListenerRunningFailed
                | DaemonPhase::WorkloadControllerRunningFailed
        )
    }

    /// No transition leaves a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DaemonPhase::DaemonDrained | DaemonPhase::DaemonExitingOnError)
    }
}

impl fmt::Display for DaemonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the daemon's current phase for observability.
pub struct StatusMonitor {
    phase: Mutex<DaemonPhase>,
    sink: Arc<dyn ObservabilitySink>,
}

impl StatusMonitor {
    /// Monitor starting at `Starting`.
    pub fn new(sink: Arc<dyn ObservabilitySink>) -> Self {
        Self {
            phase: Mutex::new(DaemonPhase::Starting),
            sink,
        }
    }

    /// Current phase.
    pub fn current(&self) -> DaemonPhase {
        *self.phase.lock().expect("status monitor mutex poisoned")
    }

    /// Move to `next` if it lies ahead of the current phase, the current
    /// phase is not terminal, and no subsystem failure has been recorded yet
    /// when `next` is one.
    ///
    /// Returns whether the transition was accepted.
    pub fn advance(&self, next: DaemonPhase) -> bool {
        let mut phase = self.phase.lock().expect("status monitor mutex poisoned");
        let current = *phase;
        let failure_recorded = current.is_subsystem_failure() && next.is_subsystem_failure();
        if next <= current || current.is_terminal() || failure_recorded {
            tracing::debug!(current = %current, requested = %next, "Ignoring non-forward phase transition");
            return false;
        }
        *phase = next;
        drop(phase);

        tracing::info!(from = %current, to = %next, "Daemon phase changed");
        self.sink.phase_changed(next);
        true
    }

    /// Enter `Initializing`.
    pub fn initializing(&self) -> bool {
        self.advance(DaemonPhase::Initializing)
    }

    /// Enter `WaitingForFirstAttestationFetch`.
    pub fn waiting_for_first_attestation_fetch(&self) -> bool {
        self.advance(DaemonPhase::WaitingForFirstAttestationFetch)
    }

    /// Enter `WaitingForFirstKeyFetch`.
    pub fn waiting_for_first_key_fetch(&self) -> bool {
        self.advance(DaemonPhase::WaitingForFirstKeyFetch)
    }

    /// Enter `WaitingForFirstHotPropertyUpdate`.
    pub fn waiting_for_first_hot_property_update(&self) -> bool {
        self.advance(DaemonPhase::WaitingForFirstHotPropertyUpdate)
    }

    /// Enter `WaitingForWorkloadRegistration`.
    pub fn waiting_for_workload_registration(&self) -> bool {
        self.advance(DaemonPhase::WaitingForWorkloadRegistration)
    }

    /// Enter `DaemonExitingOnError`.
    pub fn exiting_on_error(&self) -> bool {
        self.advance(DaemonPhase::DaemonExitingOnError)
    }

    /// Enter `DaemonDrained`.
    pub fn drained(&self) -> bool {
        self.advance(DaemonPhase::DaemonDrained)
    }
}
