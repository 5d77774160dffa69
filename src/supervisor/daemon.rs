//! Daemon supervisor.
//!
//! # Startup ordering
//! ```text
//! Initializing
//!     → TLS identity present (fatal when missing and the listener is secured)
//!     → spawn attestation provider
//!     → WaitingForFirstAttestationFetch: await first attestation set (fatal on error)
//!     → WaitingForFirstKeyFetch: TGT and OTT signing keys present (fatal when missing)
//!     → WaitingForFirstHotPropertyUpdate: spawn listener, identity refresh,
//!       fetcher, health server, workload controller; service discovery and the
//!       health provider start once the first snapshot arrives
//!     → first subsystem exits (any reason) → cancel all → start drain → join all
//!     → drain hook: health NotServing, workload shutdown, gate drained
//!     → DaemonDrained → quiescence completed
//! ```
//!
//! # Design Decisions
//! - Every subsystem shares one token linked from the drain signal and the
//!   caller's token
//! - Once serving has started, any shutdown goes through the drain hook
//! - Fatal startup errors cancel whatever already started and skip the drain

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::admission::ConcurrencyGate;
use crate::config::DaemonConfig;
use crate::fetcher::HotProperties;
use crate::health::provider::HealthProvider;
use crate::health::publisher::HealthPublisher;
use crate::health::server::HealthServer;
use crate::health::status::{DaemonPhase, StatusMonitor};
use crate::lifecycle::{linked_child, LifecycleManager, ManagedError, QuiescenceMonitor};
use crate::observability::ObservabilitySink;
use crate::supervisor::collaborators::{DaemonComponents, SigningKeySource, WorkloadController};
use crate::supervisor::task::{SubsystemError, SubsystemTask};
use crate::supervisor::task_set::SupervisedTaskSet;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Unable to load TLS identity, cannot run secure service")]
    MissingIdentity,

    #[error("Missing auth token signing keys")]
    MissingSigningKeys,

    #[error("Initial attestation fetch failed: {0}")]
    AttestationFetch(#[source] SubsystemError),

    #[error("Signing key fetch failed: {0}")]
    SigningKeyFetch(#[source] SubsystemError),

    #[error("Startup cancelled")]
    Cancelled,
}

impl DaemonError {
    fn from_subsystem(error: SubsystemError, wrap: fn(SubsystemError) -> DaemonError) -> Self {
        if error.is_cancelled() {
            DaemonError::Cancelled
        } else {
            wrap(error)
        }
    }
}

impl ManagedError for DaemonError {
    fn is_cancelled(&self) -> bool {
        matches!(self, DaemonError::Cancelled)
    }
}

pub struct SubsystemSupervisor {
    config: DaemonConfig,
    lifecycle: Arc<LifecycleManager>,
    health: Arc<HealthPublisher>,
    status: Arc<StatusMonitor>,
    gate: Arc<ConcurrencyGate>,
    hot_properties: Arc<HotProperties>,
    quiescence: Arc<QuiescenceMonitor>,
    sink: Arc<dyn ObservabilitySink>,
    components: DaemonComponents,
}

impl SubsystemSupervisor {
    /// Create a supervisor with fresh health, status and admission state.
    pub fn new(
        config: DaemonConfig,
        lifecycle: Arc<LifecycleManager>,
        components: DaemonComponents,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        let health = Arc::new(HealthPublisher::new());
        let status = Arc::new(StatusMonitor::new(sink.clone()));
        let gate = Arc::new(ConcurrencyGate::from_config(
            &config.load,
            health.clone(),
            sink.clone(),
        ));

        Self {
            config,
            lifecycle,
            health,
            status,
            gate,
            hot_properties: Arc::new(HotProperties::new()),
            quiescence: Arc::new(QuiescenceMonitor::new()),
            sink,
            components,
        }
    }

    /// Publisher consulted by the admission gate and health server.
    pub fn health(&self) -> Arc<HealthPublisher> {
        self.health.clone()
    }

    /// Current daemon phase.
    pub fn status(&self) -> Arc<StatusMonitor> {
        self.status.clone()
    }

    /// Admission gate shared with the listener and workload controller.
    pub fn gate(&self) -> Arc<ConcurrencyGate> {
        self.gate.clone()
    }

    /// Latest hot-properties snapshot.
    pub fn hot_properties(&self) -> Arc<HotProperties> {
        self.hot_properties.clone()
    }

    /// Completed once the daemon has drained.
    pub fn quiescence(&self) -> Arc<QuiescenceMonitor> {
        self.quiescence.clone()
    }

    /// Drain state shared with the signal handler.
    pub fn lifecycle(&self) -> Arc<LifecycleManager> {
        self.lifecycle.clone()
    }

    /// Start every subsystem and supervise them until shutdown completes.
    ///
    /// Returns an error only for fatal startup conditions; subsystem
    /// failures after startup end in an orderly drain.
    pub async fn run(self, caller: CancellationToken) -> Result<(), DaemonError> {
        tracing::info!("Starting daemon");
        let status = self.status.clone();
        let quiescence = self.quiescence.clone();
        let lifecycle = self.lifecycle.clone();
        let drain = DrainHook {
            health: self.health.clone(),
            workload: self.components.workload.clone(),
            gate: self.gate.clone(),
            sink: self.sink.clone(),
        };

        status.initializing();
        let result = lifecycle
            .run_managed(
                move |drain_token| self.supervise(drain_token, caller),
                Some(move || drain.run()),
            )
            .await;

        match result {
            Ok(outcome) => tracing::debug!(?outcome, "Managed run finished"),
            Err(e) => {
                status.exiting_on_error();
                tracing::error!(error = %e, "Fatal error, exiting");
                return Err(e);
            }
        }

        status.drained();
        quiescence.completed();
        tracing::info!("Daemon drained");
        Ok(())
    }

    async fn supervise(
        mut self,
        drain_token: CancellationToken,
        caller: CancellationToken,
    ) -> Result<(), DaemonError> {
        let linked = linked_child(&drain_token, &caller);
        let mut tasks = SupervisedTaskSet::new(linked.token().clone(), self.status.clone());

        match self.start_subsystems(&mut tasks).await {
            Ok(()) => match tasks.wait_first().await {
                Some(report) => tracing::info!(
                    subsystem = %report.name,
                    outcome = ?report.outcome,
                    "Subsystem exited, shutting down"
                ),
                None => tracing::warn!("No subsystems running"),
            },
            Err(e) if e.is_cancelled() => {
                tracing::info!("Startup interrupted, shutting down");
            }
            Err(e) => {
                linked.close().await;
                tasks.join_all().await;
                return Err(e);
            }
        }

        linked.close().await;
        self.lifecycle.start_drain();
        for report in tasks.join_all().await {
            tracing::debug!(subsystem = %report.name, outcome = ?report.outcome, "Subsystem stopped");
        }
        Ok(())
    }

    async fn start_subsystems(&mut self, tasks: &mut SupervisedTaskSet) -> Result<(), DaemonError> {
        let token = tasks.token().clone();

        if !self.config.service.insecure_listener {
            let loaded = self
                .components
                .identity
                .as_ref()
                .and_then(|identity| identity.current())
                .is_some();
            if !loaded {
                tracing::error!("Unable to load TLS identity, exiting");
                return Err(DaemonError::MissingIdentity);
            }
        }

        if let Some(attestation) = self.components.attestation.clone() {
            let provider = attestation.clone();
            tasks.spawn(SubsystemTask::new("attestation_provider", move |token| async move {
                provider.run(token).await
            }));

            self.status.waiting_for_first_attestation_fetch();
            let set = until_cancelled(&token, async {
                attestation
                    .current_attestation_set()
                    .await
                    .map_err(|e| DaemonError::from_subsystem(e, DaemonError::AttestationFetch))
            })
            .await?;
            tracing::info!(bundles = set.bundles.len(), "First attestation fetch completed");
        }

        if self.config.block_healthiness_on_signing_keys {
            match self.components.signing_keys.clone() {
                Some(keys) => {
                    self.status.waiting_for_first_key_fetch();
                    until_cancelled(&token, verify_signing_keys(keys.as_ref())).await?;
                    tracing::info!("Signing key verification passed");
                }
                None => tracing::warn!("No signing key source configured, skipping verification"),
            }
        } else {
            tracing::info!("Skipping signing key verification");
        }

        self.status.waiting_for_first_hot_property_update();
        self.spawn_serving(tasks).await;
        Ok(())
    }

    async fn spawn_serving(&mut self, tasks: &mut SupervisedTaskSet) {
        if let Some(listener) = self.components.listener.clone() {
            let gate = self.gate.clone();
            tasks.spawn(
                SubsystemTask::new("service_listener", move |token| async move {
                    listener.serve(gate, token).await
                })
                .with_failure_phase(DaemonPhase::ServiceListenerRunningFailed),
            );
        }

        if let Some(identity) = self.components.identity.clone() {
            tasks.spawn(SubsystemTask::new("identity_refresh", move |token| async move {
                identity.refresh_loop(token.clone()).await;
                stopped(&token)
            }));
        }

        let hot_properties = match self.components.fetcher.clone() {
            Some(fetcher) => {
                tracing::info!("Hot properties are enabled");
                fetcher.set_delegate(self.hot_properties.clone()).await;
                tasks.spawn(SubsystemTask::new("hot_properties", move |token| async move {
                    fetcher.run(token.clone()).await;
                    stopped(&token)
                }));
                Some(self.hot_properties.clone())
            }
            None => {
                tracing::info!("Hot properties are disabled");
                None
            }
        };

        match self.components.service_discovery.clone() {
            Some(discovery) => {
                tracing::info!("Enabling service discovery");
                let hot_properties = hot_properties.clone();
                let status = self.status.clone();
                tasks.spawn(
                    SubsystemTask::new("service_discovery", move |token| async move {
                        wait_for_first_snapshot(hot_properties.as_deref(), &token).await?;
                        status.waiting_for_workload_registration();
                        discovery.run(token).await
                    })
                    .with_failure_phase(DaemonPhase::ServiceDiscoveryRunningFailed),
                );
            }
            None => tracing::warn!("Service discovery not enabled"),
        }

        let provider = HealthProvider::from_config(
            &self.config.health,
            self.health.clone(),
            self.components.health_check.clone(),
        );
        tasks.spawn(SubsystemTask::new("health_provider", move |token| async move {
            wait_for_first_snapshot(hot_properties.as_deref(), &token).await?;
            provider.run(token.clone()).await;
            stopped(&token)
        }));

        if let Some(listener) = self.components.health_listener.take() {
            let server = HealthServer::new(self.health.clone());
            tasks.spawn(SubsystemTask::new("health_server", move |token| async move {
                server.serve(listener, token).await?;
                Ok(())
            }));
        }

        if let Some(workload) = self.components.workload.clone() {
            let in_flight = self.gate.subscribe_in_flight();
            let gate = self.gate.clone();
            tasks.spawn(
                SubsystemTask::new("workload_controller", move |token| async move {
                    workload.run(in_flight, gate, token).await
                })
                .with_failure_phase(DaemonPhase::WorkloadControllerRunningFailed),
            );
        }
    }
}

/// Steps run once every subsystem has stopped.
struct DrainHook {
    health: Arc<HealthPublisher>,
    workload: Option<Arc<dyn WorkloadController>>,
    gate: Arc<ConcurrencyGate>,
    sink: Arc<dyn ObservabilitySink>,
}

impl DrainHook {
    async fn run(self) -> Result<(), Infallible> {
        let started = Instant::now();
        self.health.drain();

        if let Some(workload) = &self.workload {
            if let Err(e) = workload.shutdown().await {
                tracing::error!(error = %e, "Workload controller failed to notify listeners of shutdown");
            }
        }

        let in_flight_at_start = self.gate.drain().await;
        let elapsed = started.elapsed();
        self.sink.drain_completed(elapsed, in_flight_at_start);
        tracing::info!(
            drain_duration_secs = elapsed.as_secs_f64(),
            in_flight_at_start,
            "Drain completed"
        );
        Ok(())
    }
}

async fn until_cancelled<F, T>(token: &CancellationToken, fut: F) -> Result<T, DaemonError>
where
    F: Future<Output = Result<T, DaemonError>>,
{
    tokio::select! {
        _ = token.cancelled() => Err(DaemonError::Cancelled),
        result = fut => result,
    }
}

async fn verify_signing_keys(keys: &dyn SigningKeySource) -> Result<(), DaemonError> {
    let fetch_error = |e| DaemonError::from_subsystem(e, DaemonError::SigningKeyFetch);
    let tgt = keys.tgt_signing_keys().await.map_err(fetch_error)?;
    let ott = keys.ott_signing_keys().await.map_err(fetch_error)?;

    if tgt.is_empty() || ott.is_empty() {
        tracing::error!(tgt_keys = tgt.len(), ott_keys = ott.len(), "Missing auth token signing keys");
        return Err(DaemonError::MissingSigningKeys);
    }
    Ok(())
}

async fn wait_for_first_snapshot(
    hot_properties: Option<&HotProperties>,
    token: &CancellationToken,
) -> Result<(), SubsystemError> {
    match hot_properties {
        Some(hot_properties) => hot_properties
            .wait_for_first_update(token)
            .await
            .map(|_| ())
            .ok_or(SubsystemError::Cancelled),
        None => Ok(()),
    }
}

/// Outcome of a loop that only returns when cancelled or finished.
fn stopped(token: &CancellationToken) -> Result<(), SubsystemError> {
    if token.is_cancelled() {
        Err(SubsystemError::Cancelled)
    } else {
        Ok(())
    }
}
