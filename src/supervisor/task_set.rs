//! Supervised task set.
//!
//! Every subsystem runs on its own Tokio task. When any of them finishes,
//! for any reason, the shared token is cancelled so the rest exit
//! cooperatively. Failures are logged with the subsystem name and recorded
//! as the subsystem's failure phase; the first one recorded wins.

use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::health::status::StatusMonitor;
use crate::supervisor::task::{SubsystemOutcome, SubsystemReport, SubsystemTask};

pub struct SupervisedTaskSet {
    tasks: JoinSet<SubsystemReport>,
    token: CancellationToken,
    status: Arc<StatusMonitor>,
}

/// Aborts the inner subsystem task if its supervisor wrapper goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl SupervisedTaskSet {
    /// Empty set whose tasks all observe `token`.
    pub fn new(token: CancellationToken, status: Arc<StatusMonitor>) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
            status,
        }
    }

    /// The token shared by every task in the set.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of tasks not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when every task has been joined.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Start `task`. Its first failure records the failure phase and cancels the set.
    pub fn spawn(&mut self, task: SubsystemTask) {
        let (name, failure_phase, run) = task.into_parts();
        let token = self.token.clone();
        let status = self.status.clone();

        tracing::debug!(subsystem = %name, "Starting subsystem");
        let mut inner = AbortOnDrop(tokio::spawn(run(token.clone())));

        self.tasks.spawn(async move {
            let outcome = match (&mut inner.0).await {
                Ok(Ok(())) => {
                    tracing::info!(subsystem = %name, "Subsystem finished");
                    SubsystemOutcome::Completed
                }
                Ok(Err(e)) if e.is_cancelled() => {
                    tracing::debug!(subsystem = %name, "Subsystem cancelled");
                    SubsystemOutcome::Cancelled
                }
                Ok(Err(e)) => {
                    tracing::error!(subsystem = %name, error = %e, "Subsystem failed");
                    SubsystemOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    tracing::error!(subsystem = %name, error = %e, "Subsystem panicked");
                    SubsystemOutcome::Panicked(e.to_string())
                }
            };

            if outcome.is_failure() {
                if let Some(phase) = failure_phase {
                    status.advance(phase);
                }
            }
            token.cancel();

            SubsystemReport { name, outcome }
        });
    }

    /// Wait for the next subsystem to finish. `None` when the set is empty.
    pub async fn wait_first(&mut self) -> Option<SubsystemReport> {
        loop {
            match self.tasks.join_next().await? {
                Ok(report) => return Some(report),
                Err(e) => tracing::error!(error = %e, "Subsystem supervisor task aborted"),
            }
        }
    }

    /// Wait for every remaining subsystem.
    pub async fn join_all(&mut self) -> Vec<SubsystemReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        while let Some(report) = self.wait_first().await {
            reports.push(report);
        }
        reports
    }
}
