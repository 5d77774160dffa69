//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fleetnode::admission::{ConcurrencyGate, HandlerError, RequestStatus};
use fleetnode::config::DaemonConfig;
use fleetnode::health::DaemonPhase;
use fleetnode::observability::ObservabilitySink;
use fleetnode::supervisor::{
    AttestationProvider, AttestationSet, ServiceDiscovery, ServiceListener, SigningKeySource,
    SubsystemError, WorkloadController,
};

/// Config for tests: plain listener, no signing-key gate, short intervals.
pub fn test_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.service.insecure_listener = true;
    config.block_healthiness_on_signing_keys = false;
    config.health.check_interval_secs = 1;
    config.lifecycle.drain_timeout_secs = 5;
    config.load.max_concurrent_requests = 4;
    config
}

/// Ordered record of what the fakes did.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == event)
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == event)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub phases: Mutex<Vec<DaemonPhase>>,
    pub in_flight: Mutex<Vec<usize>>,
    pub drains: Mutex<Vec<(Duration, usize)>>,
    pub requests: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn phases(&self) -> Vec<DaemonPhase> {
        self.phases.lock().unwrap().clone()
    }

    pub fn drains(&self) -> Vec<(Duration, usize)> {
        self.drains.lock().unwrap().clone()
    }

    pub fn in_flight_samples(&self) -> Vec<usize> {
        self.in_flight.lock().unwrap().clone()
    }
}

impl ObservabilitySink for RecordingSink {
    fn phase_changed(&self, phase: DaemonPhase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn in_flight(&self, count: usize) {
        self.in_flight.lock().unwrap().push(count);
    }

    fn drain_completed(&self, duration: Duration, in_flight_at_start: usize) {
        self.drains.lock().unwrap().push((duration, in_flight_at_start));
    }

    fn request_completed(&self, operation: &str, _duration: Duration, success: bool) {
        self.requests.lock().unwrap().push((operation.to_string(), success));
    }
}

/// Attestation provider that publishes its first set after `delay`.
pub struct FakeAttestation {
    pub log: EventLog,
    pub delay: Duration,
}

#[async_trait]
impl AttestationProvider for FakeAttestation {
    async fn run(&self, token: CancellationToken) -> Result<(), SubsystemError> {
        token.cancelled().await;
        self.log.push("attestation_cancelled");
        Err(SubsystemError::Cancelled)
    }

    async fn current_attestation_set(&self) -> Result<AttestationSet, SubsystemError> {
        tokio::time::sleep(self.delay).await;
        self.log.push("attestation_ready");
        Ok(AttestationSet {
            bundles: vec![vec![0xa1]],
        })
    }
}

pub struct FakeKeys {
    pub log: EventLog,
    pub tgt: usize,
    pub ott: usize,
}

#[async_trait]
impl SigningKeySource for FakeKeys {
    async fn tgt_signing_keys(&self) -> Result<Vec<Vec<u8>>, SubsystemError> {
        self.log.push("tgt_keys_fetched");
        Ok(vec![vec![0x30]; self.tgt])
    }

    async fn ott_signing_keys(&self) -> Result<Vec<Vec<u8>>, SubsystemError> {
        self.log.push("ott_keys_fetched");
        Ok(vec![vec![0x30]; self.ott])
    }
}

/// Subsystem that records its start, then either fails at once or runs
/// until cancelled.
pub struct FakeSubsystem {
    pub name: &'static str,
    pub log: EventLog,
    pub fail_immediately: bool,
    pub fail_on_cancel: bool,
}

impl FakeSubsystem {
    pub fn running(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: log.clone(),
            fail_immediately: false,
            fail_on_cancel: false,
        }
    }

    pub fn failing(name: &'static str, log: &EventLog) -> Self {
        Self {
            fail_immediately: true,
            ..Self::running(name, log)
        }
    }

    pub fn failing_on_cancel(name: &'static str, log: &EventLog) -> Self {
        Self {
            fail_on_cancel: true,
            ..Self::running(name, log)
        }
    }

    fn start(&self) -> Result<(), SubsystemError> {
        self.log.push(format!("{}_started", self.name));
        if self.fail_immediately {
            return Err(SubsystemError::failed(format!("{} rejected", self.name)));
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), SubsystemError> {
        self.log.push(format!("{}_cancelled", self.name));
        if self.fail_on_cancel {
            Err(SubsystemError::failed(format!("{} lost connection", self.name)))
        } else {
            Err(SubsystemError::Cancelled)
        }
    }

    async fn run_until_cancelled(&self, token: CancellationToken) -> Result<(), SubsystemError> {
        self.start()?;
        token.cancelled().await;
        self.stop()
    }
}

#[async_trait]
impl ServiceDiscovery for FakeSubsystem {
    async fn run(&self, token: CancellationToken) -> Result<(), SubsystemError> {
        self.run_until_cancelled(token).await
    }
}

#[async_trait]
impl ServiceListener for FakeSubsystem {
    async fn serve(
        &self,
        _gate: Arc<ConcurrencyGate>,
        token: CancellationToken,
    ) -> Result<(), SubsystemError> {
        self.run_until_cancelled(token).await
    }
}

/// Workload controller recording the in-flight samples it is sent, keeping
/// the gate it was handed and counting shutdown notifications.
pub struct FakeWorkload {
    pub inner: FakeSubsystem,
    pub shutdowns: AtomicUsize,
    pub samples: Mutex<Vec<usize>>,
    pub gate: Mutex<Option<Arc<ConcurrencyGate>>>,
}

impl FakeWorkload {
    pub fn new(inner: FakeSubsystem) -> Self {
        Self {
            inner,
            shutdowns: AtomicUsize::new(0),
            samples: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> Vec<usize> {
        self.samples.lock().unwrap().clone()
    }

    pub fn gate(&self) -> Option<Arc<ConcurrencyGate>> {
        self.gate.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkloadController for FakeWorkload {
    async fn run(
        &self,
        mut in_flight: mpsc::UnboundedReceiver<usize>,
        gate: Arc<ConcurrencyGate>,
        token: CancellationToken,
    ) -> Result<(), SubsystemError> {
        *self.gate.lock().unwrap() = Some(gate);
        self.inner.start()?;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                Some(count) = in_flight.recv() => self.samples.lock().unwrap().push(count),
            }
        }
        self.inner.stop()
    }

    async fn shutdown(&self) -> Result<(), SubsystemError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.log.push("workload_shutdown");
        Ok(())
    }
}

/// Request handled by `gate` that holds its slot until the sender fires.
pub fn submit(
    gate: &Arc<ConcurrencyGate>,
    name: &'static str,
) -> (oneshot::Sender<()>, JoinHandle<Result<&'static str, RequestStatus>>) {
    let (release, released) = oneshot::channel::<()>();
    let gate = gate.clone();
    let task = tokio::spawn(async move {
        gate.handle(
            name,
            |name| async move {
                let _ = released.await;
                Ok::<_, HandlerError>(name)
            },
            "invoke",
        )
        .await
    });
    (release, task)
}

/// Poll `condition` every millisecond, panicking after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
