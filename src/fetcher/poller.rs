//! Periodic configuration fetcher.
//!
//! # Responsibilities
//! - Fetch on a [`FetchSchedule`] until cancelled
//! - Log fetch errors and retry after `error_retry_interval`, forever
//! - Serialize fetches through a single-slot lock
//! - Cache the last snapshot and push it to the registered delegate
//!
//! # Design Decisions
//! - Delegate registration takes the fetch slot, so a new delegate sees the
//!   cached snapshot exactly once and never races a concurrent delivery
//! - The cached snapshot is readable without locking

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::FetcherConfig;
use crate::fetcher::schedule::FetchSchedule;
use crate::fetcher::source::{ConfigurationInfo, FetchError, FetcherDataSource};
use crate::observability::ObservabilitySink;

/// Receives every successfully fetched snapshot.
#[async_trait]
pub trait FetcherDelegate: Send + Sync {
    async fn on_configuration_update(&self, info: Arc<ConfigurationInfo>);
}

pub struct PollingFetcher {
    source: Arc<dyn FetcherDataSource>,
    schedule: Mutex<FetchSchedule>,
    fetch_slot: tokio::sync::Mutex<()>,
    latest: ArcSwapOption<ConfigurationInfo>,
    delegate: Mutex<Option<Arc<dyn FetcherDelegate>>>,
    sink: Arc<dyn ObservabilitySink>,
}

impl PollingFetcher {
    /// Fetcher with no delegate and nothing cached.
    pub fn new(
        source: Arc<dyn FetcherDataSource>,
        schedule: FetchSchedule,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            source,
            schedule: Mutex::new(schedule),
            fetch_slot: tokio::sync::Mutex::new(()),
            latest: ArcSwapOption::empty(),
            delegate: Mutex::new(None),
            sink,
        }
    }

    /// Fetcher scheduled from `config`.
    pub fn from_config(
        config: &FetcherConfig,
        source: Arc<dyn FetcherDataSource>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self::new(source, FetchSchedule::from_config(config), sink)
    }

    /// Last successfully fetched snapshot.
    pub fn latest(&self) -> Option<Arc<ConfigurationInfo>> {
        self.latest.load_full()
    }

    /// Register `delegate`, replacing any previous one. Delivers the cached
    /// snapshot immediately when there is one.
    pub async fn set_delegate(&self, delegate: Arc<dyn FetcherDelegate>) {
        let _slot = self.fetch_slot.lock().await;
        *self.delegate.lock().expect("fetcher delegate mutex poisoned") = Some(delegate.clone());
        if let Some(latest) = self.latest.load_full() {
            delegate.on_configuration_update(latest).await;
        }
    }

    /// Fetch once, waiting for any fetch already in progress.
    pub async fn fetch_now(&self) -> Result<Arc<ConfigurationInfo>, FetchError> {
        let _slot = self.fetch_slot.lock().await;

        let started = Instant::now();
        let result = self.source.fetch().await;
        self.sink.fetch_completed(started.elapsed(), result.is_ok());
        let info = Arc::new(result?);

        self.lock_schedule().record_fetch(started);
        let previous = self.latest.swap(Some(info.clone()));
        if previous.map(|p| p.version != info.version).unwrap_or(true) {
            tracing::info!(version = %info.version, "Fetched new configuration");
        } else {
            tracing::debug!(version = %info.version, "Configuration unchanged");
        }

        let delegate = self
            .delegate
            .lock()
            .expect("fetcher delegate mutex poisoned")
            .clone();
        if let Some(delegate) = delegate {
            delegate.on_configuration_update(info.clone()).await;
        }
        Ok(info)
    }

    /// Poll until `token` is cancelled. Errors never end the loop.
    pub async fn run(&self, token: CancellationToken) {
        let (mut delay, polling_interval) = {
            let schedule = self.lock_schedule();
            (schedule.next_delay(Instant::now()), schedule.polling_interval())
        };
        tracing::info!(
            first_fetch_in_ms = delay.as_millis() as u64,
            polling_interval_ms = polling_interval.as_millis() as u64,
            "Fetcher starting"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = token.cancelled() => break,
                result = self.fetch_now() => result,
            };

            delay = match result {
                Ok(_) => {
                    let next = self.lock_schedule().next_delay(Instant::now());
                    tracing::debug!(next_fetch_in_ms = next.as_millis() as u64, "Fetch completed");
                    next
                }
                Err(e) => {
                    let retry = self.lock_schedule().error_retry_interval();
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = retry.as_millis() as u64,
                        "Error during fetch operation"
                    );
                    retry
                }
            };
        }

        tracing::info!("Fetcher stopped");
    }

    fn lock_schedule(&self) -> std::sync::MutexGuard<'_, FetchSchedule> {
        self.schedule.lock().expect("fetch schedule mutex poisoned")
    }
}
