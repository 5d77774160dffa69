//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the fleet-node daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Node identity within the fleet.
    pub node: NodeConfig,

    /// Secured service listener settings.
    pub service: ServiceConfig,

    /// TLS identity material.
    pub identity: IdentityConfig,

    /// Health reporting settings.
    pub health: HealthConfig,

    /// Admission capacity.
    pub load: LoadConfig,

    /// Drain behaviour.
    pub lifecycle: LifecycleConfig,

    /// Hot-properties fetch schedule.
    pub fetcher: FetcherConfig,

    /// Optional service discovery registration.
    pub service_discovery: Option<ServiceDiscoveryConfig>,

    /// Refuse to become ready until auth token signing keys are present.
    pub block_healthiness_on_signing_keys: bool,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            service: ServiceConfig::default(),
            identity: IdentityConfig::default(),
            health: HealthConfig::default(),
            load: LoadConfig::default(),
            lifecycle: LifecycleConfig::default(),
            fetcher: FetcherConfig::default(),
            service_discovery: None,
            block_healthiness_on_signing_keys: true,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Role of this node in its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Leader,
    Follower,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub role: NodeRole,
}

/// Service listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address (e.g., "0.0.0.0:4443").
    pub bind_address: String,

    /// Run without TLS identity. Development only.
    pub insecure_listener: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4443".to_string(),
            insecure_listener: false,
        }
    }
}

/// Identity (certificate + key) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: Option<String>,

    /// Path to private key file (PEM).
    pub key_path: Option<String>,

    /// How often the identity is reloaded from disk.
    pub refresh_interval_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            refresh_interval_secs: 60,
        }
    }
}

/// Health reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Serve the HTTP health endpoint.
    pub enabled: bool,

    /// Health endpoint bind address.
    pub bind_address: String,

    /// Interval between local health checks in seconds.
    pub check_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8080".to_string(),
            check_interval_secs: 5,
        }
    }
}

/// Admission capacity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Maximum concurrently in-flight requests.
    pub max_concurrent_requests: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 100,
        }
    }
}

/// Drain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on the drain hook in seconds.
    pub drain_timeout_secs: u64,
}

impl LifecycleConfig {
    /// Deadline for the drain hook.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 120,
        }
    }
}

/// Hot-properties fetch schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Delay before the first fetch in milliseconds.
    pub initial_delay_ms: u64,

    /// Target spacing between fetch starts in milliseconds.
    pub polling_interval_ms: u64,

    /// Wait after a failed fetch in milliseconds.
    pub error_retry_interval_ms: u64,

    /// JSON snapshot file to poll. Hot properties are disabled when unset.
    pub source_path: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            polling_interval_ms: 300_000,
            error_retry_interval_ms: 30_000,
            source_path: None,
        }
    }
}

/// Service discovery registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDiscoveryConfig {
    pub endpoint: String,
    pub cell_id: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
