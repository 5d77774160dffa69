//! Periodic health evaluation.
//!
//! Runs a [`HealthCheck`] every `check_interval` and publishes the result
//! until cancelled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::HealthConfig;
use crate::health::publisher::{HealthPublisher, HealthStatus};

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

/// Reports healthy unconditionally. Used when nothing more specific is wired.
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub struct HealthProvider {
    publisher: Arc<HealthPublisher>,
    check: Arc<dyn HealthCheck>,
    interval: Duration,
}

impl HealthProvider {
    /// Provider publishing the result of `check` every `interval`.
    pub fn new(publisher: Arc<HealthPublisher>, check: Arc<dyn HealthCheck>, interval: Duration) -> Self {
        Self {
            publisher,
            check,
            interval,
        }
    }

    /// Provider using the configured check interval.
    pub fn from_config(
        config: &HealthConfig,
        publisher: Arc<HealthPublisher>,
        check: Arc<dyn HealthCheck>,
    ) -> Self {
        Self::new(publisher, check, Duration::from_secs(config.check_interval_secs))
    }

    /// Run checks until cancelled.
    pub async fn run(&self, token: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Health provider starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let healthy = tokio::select! {
                _ = token.cancelled() => break,
                healthy = self.check.is_healthy() => healthy,
            };
            let status = if healthy {
                HealthStatus::Serving
            } else {
                HealthStatus::NotServing
            };
            self.publisher.update_status(status);
        }

        tracing::info!("Health provider stopped");
    }
}
