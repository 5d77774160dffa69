//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate each delivery into a drain request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The first signal starts the drain; repeats are absorbed, never restart it

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::manager::LifecycleManager;

/// Handle one termination signal delivery. Returns whether it started the
/// drain.
pub fn on_termination_signal(lifecycle: &LifecycleManager, signal: &'static str) -> bool {
    if lifecycle.start_drain() {
        tracing::info!(signal, "Termination signal received, draining");
        true
    } else {
        tracing::info!(signal, "Drain already in progress, ignoring signal");
        false
    }
}

/// Listen for termination signals for the rest of the process lifetime.
pub fn spawn_signal_handler(lifecycle: Arc<LifecycleManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = listen(&lifecycle).await {
            tracing::error!(error = %e, "Failed to install signal handlers");
        }
    })
}

#[cfg(unix)]
async fn listen(lifecycle: &LifecycleManager) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    loop {
        let name = tokio::select! {
            received = terminate.recv() => match received {
                Some(()) => "SIGTERM",
                None => return Ok(()),
            },
            received = interrupt.recv() => match received {
                Some(()) => "SIGINT",
                None => return Ok(()),
            },
        };
        on_termination_signal(lifecycle, name);
    }
}

#[cfg(not(unix))]
async fn listen(lifecycle: &LifecycleManager) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        on_termination_signal(lifecycle, "CTRL_C");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_signals_are_absorbed() {
        let lifecycle = LifecycleManager::default();

        assert!(on_termination_signal(&lifecycle, "SIGTERM"));
        assert!(!on_termination_signal(&lifecycle, "SIGTERM"));
        assert!(!on_termination_signal(&lifecycle, "SIGINT"));
        assert!(lifecycle.is_draining());
    }
}
