//! Quiescence notification.
//!
//! Set once the daemon has drained and no job or request work remains.

use tokio::sync::watch;

pub struct QuiescenceMonitor {
    tx: watch::Sender<bool>,
}

impl QuiescenceMonitor {
    /// Monitor that has not yet quiesced.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Mark the daemon quiesced and release waiters.
    pub fn completed(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("Quiescence completed");
        }
    }

    /// True once `completed` has been called.
    pub fn is_quiesced(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once quiescence has been reported.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|quiesced| *quiesced).await;
    }
}

impl Default for QuiescenceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
