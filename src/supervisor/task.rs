//! Supervised unit of work.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::health::status::DaemonPhase;

pub type SubsystemFuture = Pin<Box<dyn Future<Output = Result<(), SubsystemError>> + Send>>;

type RunFn = Box<dyn FnOnce(CancellationToken) -> SubsystemFuture + Send>;

#[derive(Debug, Error)]
pub enum SubsystemError {
    /// The subsystem stopped because the shared signal fired.
    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

impl SubsystemError {
    /// Failure with a human-readable reason.
    pub fn failed(message: impl Into<String>) -> Self {
        SubsystemError::Failed(message.into())
    }

    /// True when the subsystem only observed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubsystemError::Cancelled)
    }
}

/// A named subsystem run loop, started once under the shared cancellation
/// signal.
pub struct SubsystemTask {
    name: String,
    failure_phase: Option<DaemonPhase>,
    run: RunFn,
}

impl SubsystemTask {
    /// Named task whose body receives the shared cancellation token.
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SubsystemError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            failure_phase: None,
            run: Box::new(move |token| Box::pin(run(token))),
        }
    }

    /// Phase recorded when this subsystem fails.
    pub fn with_failure_phase(mut self, phase: DaemonPhase) -> Self {
        self.failure_phase = Some(phase);
        self
    }

    /// Name used in logs and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Phase recorded if this task fails, if any.
    pub fn failure_phase(&self) -> Option<DaemonPhase> {
        self.failure_phase
    }

    pub(crate) fn into_parts(self) -> (String, Option<DaemonPhase>, RunFn) {
        (self.name, self.failure_phase, self.run)
    }
}

impl fmt::Debug for SubsystemTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsystemTask")
            .field("name", &self.name)
            .field("failure_phase", &self.failure_phase)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsystemOutcome {
    Completed,
    Cancelled,
    Failed(String),
    Panicked(String),
}

impl SubsystemOutcome {
    /// Failed or panicked.
    pub fn is_failure(&self) -> bool {
        matches!(self, SubsystemOutcome::Failed(_) | SubsystemOutcome::Panicked(_))
    }
}

/// How one subsystem ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemReport {
    pub name: String,
    pub outcome: SubsystemOutcome,
}
