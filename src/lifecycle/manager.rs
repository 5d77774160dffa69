//! Drain state machine.
//!
//! # States
//! ```text
//! Running ──start_drain()──▶ Draining   (one-way, first call only)
//! ```
//!
//! `run_managed` executes the main action under a token derived from the
//! drain signal. When the action returns and a drain was requested, the drain
//! hook runs on its own task raced against `drain_timeout`.
//!
//! # Design Decisions
//! - Drain is best-effort: hook errors, panics and timeouts are logged only
//! - Cancellation caused by drain is not an error
//! - Any other error from the main action propagates to the caller

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::LifecycleConfig;

/// Errors returned from a managed main action.
pub trait ManagedError: fmt::Display {
    /// True when the error only reports that the action observed cancellation.
    fn is_cancelled(&self) -> bool;
}

/// How the drain hook ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed,
    Failed,
    TimedOut,
}

pub struct LifecycleManager {
    drain_timeout: Duration,
    drain_token: CancellationToken,
    draining: AtomicBool,
}

impl LifecycleManager {
    /// Manager using the configured drain timeout.
    pub fn new(config: &LifecycleConfig) -> Self {
        Self::with_timeout(config.drain_timeout())
    }

    /// Manager with an explicit drain timeout.
    pub fn with_timeout(drain_timeout: Duration) -> Self {
        Self {
            drain_timeout,
            drain_token: CancellationToken::new(),
            draining: AtomicBool::new(false),
        }
    }

    /// Request a drain. Only the first call has an effect; returns whether
    /// this call started it.
    pub fn start_drain(&self) -> bool {
        if self.draining.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("Starting drain operation");
        self.drain_token.cancel();
        true
    }

    /// True once `start_drain` has been called.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// The drain signal itself. Cancelled exactly when draining starts.
    pub fn drain_token(&self) -> CancellationToken {
        self.drain_token.clone()
    }

    /// Run `main` and, if a drain was requested by the time it returns, the
    /// drain hook.
    ///
    /// Returns the drain outcome when the hook ran.
    pub async fn run_managed<M, MFut, E, D, DFut, DE>(
        &self,
        main: M,
        drain_hook: Option<D>,
    ) -> Result<Option<DrainOutcome>, E>
    where
        M: FnOnce(CancellationToken) -> MFut,
        MFut: Future<Output = Result<(), E>>,
        E: ManagedError,
        D: FnOnce() -> DFut,
        DFut: Future<Output = Result<(), DE>> + Send + 'static,
        DE: fmt::Display + Send + 'static,
    {
        let result = match main(self.drain_token.child_token()).await {
            Err(e) if e.is_cancelled() && self.is_draining() => {
                tracing::info!("Operation cancelled due to drain request");
                Ok(())
            }
            other => other,
        };

        let mut outcome = None;
        if self.is_draining() {
            if let Some(hook) = drain_hook {
                outcome = Some(self.run_drain_hook(hook()).await);
            }
        }

        result.map(|()| outcome)
    }

    async fn run_drain_hook<F, DE>(&self, hook: F) -> DrainOutcome
    where
        F: Future<Output = Result<(), DE>> + Send + 'static,
        DE: fmt::Display + Send + 'static,
    {
        let mut handle = tokio::spawn(hook);
        match tokio::time::timeout(self.drain_timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => DrainOutcome::Completed,
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "Error during drain operation");
                DrainOutcome::Failed
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Drain operation aborted");
                DrainOutcome::Failed
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    timeout_secs = self.drain_timeout.as_secs_f64(),
                    "Drain operation timed out, continuing shutdown"
                );
                DrainOutcome::TimedOut
            }
        }
    }
}

/// Token cancelled by either of two parents.
///
/// Dropping it cancels the token, which also ends the bridge task watching
/// the second parent.
pub struct LinkedToken {
    token: CancellationToken,
    guard: DropGuard,
    bridge: JoinHandle<()>,
}

impl LinkedToken {
    /// The linked token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the token and wait for the bridge task to exit.
    pub async fn close(self) {
        let LinkedToken { token, guard, bridge } = self;
        drop(guard);
        debug_assert!(token.is_cancelled());
        if let Err(e) = bridge.await {
            tracing::warn!(error = %e, "Cancellation bridge task failed");
        }
    }
}

/// A child of `parent` that is also cancelled when `other` is.
///
/// Must be called from within a Tokio runtime.
pub fn linked_child(parent: &CancellationToken, other: &CancellationToken) -> LinkedToken {
    let token = parent.child_token();
    let other = other.clone();
    let watcher = token.clone();
    let bridge = tokio::spawn(async move {
        tokio::select! {
            _ = other.cancelled() => watcher.cancel(),
            _ = watcher.cancelled() => {}
        }
    });
    LinkedToken {
        guard: token.clone().drop_guard(),
        token,
        bridge,
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(&LifecycleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Cancelled,
        Boom,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl ManagedError for TestError {
        fn is_cancelled(&self) -> bool {
            matches!(self, TestError::Cancelled)
        }
    }

    type NoHook = fn() -> std::future::Ready<Result<(), String>>;

    #[test]
    fn test_start_drain_transitions_once() {
        let manager = LifecycleManager::default();
        assert!(!manager.is_draining());

        assert!(manager.start_drain());
        for _ in 0..5 {
            assert!(!manager.start_drain());
        }
        assert!(manager.is_draining());
        assert!(manager.drain_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_no_hook_without_drain_request() {
        let manager = LifecycleManager::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();

        let result = manager
            .run_managed(
                |_token| async { Ok::<_, TestError>(()) },
                Some(move || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }),
            )
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drain_cancellation_is_not_an_error() {
        let manager = Arc::new(LifecycleManager::default());
        let m = manager.clone();

        let result = manager
            .run_managed(
                |token| async move {
                    m.start_drain();
                    token.cancelled().await;
                    Err(TestError::Cancelled)
                },
                Some(|| async { Ok::<_, String>(()) }),
            )
            .await;

        assert_eq!(result, Ok(Some(DrainOutcome::Completed)));
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let manager = LifecycleManager::default();
        let result = manager
            .run_managed(|_token| async { Err(TestError::Boom) }, None::<NoHook>)
            .await;
        assert_eq!(result, Err(TestError::Boom));
    }

    #[tokio::test]
    async fn test_hook_error_is_contained() {
        let manager = LifecycleManager::default();
        manager.start_drain();

        let result = manager
            .run_managed(
                |_token| async { Ok::<_, TestError>(()) },
                Some(|| async { Err::<(), _>("workload controller unreachable".to_string()) }),
            )
            .await;

        assert_eq!(result, Ok(Some(DrainOutcome::Failed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_hook_times_out() {
        let manager = LifecycleManager::with_timeout(Duration::from_secs(2));
        manager.start_drain();

        let result = manager
            .run_managed(
                |_token| async { Ok::<_, TestError>(()) },
                Some(|| async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok::<_, String>(())
                }),
            )
            .await;

        assert_eq!(result, Ok(Some(DrainOutcome::TimedOut)));
    }

    #[tokio::test]
    async fn test_linked_token_follows_caller() {
        let manager = LifecycleManager::default();
        let caller = CancellationToken::new();
        let linked = linked_child(&manager.drain_token(), &caller);

        caller.cancel();
        tokio::time::timeout(Duration::from_secs(1), linked.token().cancelled())
            .await
            .unwrap();
        assert!(!manager.is_draining());
        linked.close().await;
    }

    #[tokio::test]
    async fn test_linked_token_follows_drain() {
        let manager = LifecycleManager::default();
        let linked = linked_child(&manager.drain_token(), &CancellationToken::new());

        manager.start_drain();
        assert!(linked.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_closing_linked_token_stops_bridge() {
        let parent = CancellationToken::new();
        let other = CancellationToken::new();
        let linked = linked_child(&parent, &other);
        let token = linked.token().clone();

        tokio::time::timeout(Duration::from_secs(1), linked.close())
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!other.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_linked_token_cancels_it() {
        let other = CancellationToken::new();
        let linked = linked_child(&CancellationToken::new(), &other);
        let token = linked.token().clone();

        drop(linked);
        assert!(token.is_cancelled());
        assert!(!other.is_cancelled());
    }
}
