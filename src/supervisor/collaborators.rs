//! Narrow interfaces to the subsystems the daemon supervises but does not
//! implement.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::admission::ConcurrencyGate;
use crate::fetcher::PollingFetcher;
use crate::health::provider::{AlwaysHealthy, HealthCheck};
use crate::supervisor::identity::FileIdentityManager;
use crate::supervisor::task::SubsystemError;

/// Opaque attestation bundles published to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttestationSet {
    pub bundles: Vec<Vec<u8>>,
}

#[async_trait]
pub trait AttestationProvider: Send + Sync {
    /// Keep attestation material fresh until cancelled.
    async fn run(&self, token: CancellationToken) -> Result<(), SubsystemError>;

    /// The current attestation set, waiting for the first fetch if needed.
    async fn current_attestation_set(&self) -> Result<AttestationSet, SubsystemError>;
}

/// Public keys used to verify auth tokens.
#[async_trait]
pub trait SigningKeySource: Send + Sync {
    /// Ticket-granting token signing keys (DER).
    async fn tgt_signing_keys(&self) -> Result<Vec<Vec<u8>>, SubsystemError>;

    /// One-time token signing keys (DER).
    async fn ott_signing_keys(&self) -> Result<Vec<Vec<u8>>, SubsystemError>;
}

#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Register and keep the registration alive until cancelled.
    async fn run(&self, token: CancellationToken) -> Result<(), SubsystemError>;
}

/// The request-serving listener. Every inbound request goes through `gate`.
#[async_trait]
pub trait ServiceListener: Send + Sync {
    async fn serve(
        &self,
        gate: Arc<ConcurrencyGate>,
        token: CancellationToken,
    ) -> Result<(), SubsystemError>;
}

/// Load-shedding collaborator.
#[async_trait]
pub trait WorkloadController: Send + Sync {
    /// Observe the in-flight count stream and pause or resume admission.
    async fn run(
        &self,
        in_flight: mpsc::UnboundedReceiver<usize>,
        gate: Arc<ConcurrencyGate>,
        token: CancellationToken,
    ) -> Result<(), SubsystemError>;

    /// Tell downstream listeners this node is going away.
    async fn shutdown(&self) -> Result<(), SubsystemError>;
}

/// Everything the supervisor starts. Absent collaborators are skipped.
pub struct DaemonComponents {
    pub identity: Option<Arc<FileIdentityManager>>,
    pub attestation: Option<Arc<dyn AttestationProvider>>,
    pub signing_keys: Option<Arc<dyn SigningKeySource>>,
    pub fetcher: Option<Arc<PollingFetcher>>,
    pub service_discovery: Option<Arc<dyn ServiceDiscovery>>,
    pub listener: Option<Arc<dyn ServiceListener>>,
    pub workload: Option<Arc<dyn WorkloadController>>,
    pub health_check: Arc<dyn HealthCheck>,
    pub health_listener: Option<TcpListener>,
}

impl Default for DaemonComponents {
    fn default() -> Self {
        Self {
            identity: None,
            attestation: None,
            signing_keys: None,
            fetcher: None,
            service_discovery: None,
            listener: None,
            workload: None,
            health_check: Arc::new(AlwaysHealthy),
            health_listener: None,
        }
    }
}
