//! Runtime configuration snapshot shared with the rest of the daemon.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::fetcher::poller::FetcherDelegate;
use crate::fetcher::source::ConfigurationInfo;

/// Latest hot-properties snapshot. Subscribers are woken only when the
/// version changes.
pub struct HotProperties {
    tx: watch::Sender<Option<Arc<ConfigurationInfo>>>,
}

impl HotProperties {
    /// Empty until the first snapshot is applied.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Most recent snapshot.
    pub fn current(&self) -> Option<Arc<ConfigurationInfo>> {
        self.tx.borrow().clone()
    }

    /// Version of the most recent snapshot.
    pub fn version(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|info| info.version.clone())
    }

    /// Receiver notified on every version change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<ConfigurationInfo>>> {
        self.tx.subscribe()
    }

    /// Wait for the first snapshot. Returns `None` if `token` fires first.
    pub async fn wait_for_first_update(
        &self,
        token: &CancellationToken,
    ) -> Option<Arc<ConfigurationInfo>> {
        let mut rx = self.tx.subscribe();
        let first = async move {
            rx.wait_for(|info| info.is_some())
                .await
                .ok()
                .and_then(|info| info.clone())
        };
        tokio::select! {
            _ = token.cancelled() => None,
            info = first => info,
        }
    }

    /// Store `info` if its version differs. Returns whether subscribers were notified.
    pub fn apply(&self, info: Arc<ConfigurationInfo>) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            let same = current
                .as_ref()
                .map(|c| c.version == info.version)
                .unwrap_or(false);
            if !same {
                *current = Some(info.clone());
            }
            !same
        });
        if changed {
            tracing::info!(version = %info.version, "Hot properties updated");
        }
        changed
    }
}

impl Default for HotProperties {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetcherDelegate for HotProperties {
    async fn on_configuration_update(&self, info: Arc<ConfigurationInfo>) {
        self.apply(info);
    }
}
