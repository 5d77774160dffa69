//! TLS identity material loaded from PEM files.
//!
//! The identity is reloaded on a fixed interval so rotated certificates are
//! picked up without a restart. A failed reload keeps the previous identity.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::IdentityConfig;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("No private key found in {0}")]
    NoPrivateKey(PathBuf),
}

/// DER-encoded certificate chain and private key.
pub struct Identity {
    cert_chain: Vec<Vec<u8>>,
    private_key: Vec<u8>,
}

impl Identity {
    /// Read and parse the PEM certificate chain and private key.
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self, IdentityError> {
        let cert_pem = read(cert_path).await?;
        let key_pem = read(key_path).await?;

        let mut cert_reader = cert_pem.as_slice();
        let cert_chain = rustls_pemfile::certs(&mut cert_reader)
            .map(|cert| cert.map(|der| der.as_ref().to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| IdentityError::Io {
                path: cert_path.to_path_buf(),
                source,
            })?;
        if cert_chain.is_empty() {
            return Err(IdentityError::NoCertificates(cert_path.to_path_buf()));
        }

        let mut key_reader = key_pem.as_slice();
        let private_key = rustls_pemfile::private_key(&mut key_reader)
            .map_err(|source| IdentityError::Io {
                path: key_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| IdentityError::NoPrivateKey(key_path.to_path_buf()))?;

        Ok(Self {
            cert_chain,
            private_key: private_key.secret_der().to_vec(),
        })
    }

    /// Certificates in file order, leaf first.
    pub fn cert_chain(&self) -> &[Vec<u8>] {
        &self.cert_chain
    }

    /// PKCS#8, PKCS#1 or SEC1 key bytes as found in the key file.
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("certificates", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, IdentityError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
}

pub struct FileIdentityManager {
    cert_path: PathBuf,
    key_path: PathBuf,
    refresh_interval: Duration,
    current: ArcSwapOption<Identity>,
}

impl FileIdentityManager {
    /// Create the manager and attempt an initial load. A failed initial load
    /// is logged and leaves no identity until a refresh succeeds.
    pub async fn new(cert_path: PathBuf, key_path: PathBuf, refresh_interval: Duration) -> Self {
        let manager = Self {
            cert_path,
            key_path,
            refresh_interval,
            current: ArcSwapOption::empty(),
        };
        if let Err(e) = manager.reload().await {
            tracing::error!(error = %e, "Unable to load TLS identity");
        }
        manager
    }

    /// `None` when no certificate and key paths are configured.
    pub async fn from_config(config: &IdentityConfig) -> Option<Self> {
        match (&config.cert_path, &config.key_path) {
            (Some(cert), Some(key)) => Some(
                Self::new(
                    PathBuf::from(cert),
                    PathBuf::from(key),
                    Duration::from_secs(config.refresh_interval_secs),
                )
                .await,
            ),
            _ => {
                tracing::info!("No TLS identity configured, identity management disabled");
                None
            }
        }
    }

    /// The most recently loaded identity.
    pub fn current(&self) -> Option<Arc<Identity>> {
        self.current.load_full()
    }

    /// Reload from disk, replacing the current identity on success.
    pub async fn reload(&self) -> Result<Arc<Identity>, IdentityError> {
        let identity = Arc::new(Identity::load(&self.cert_path, &self.key_path).await?);
        tracing::debug!(certificates = identity.cert_chain().len(), "Loaded TLS identity");
        self.current.store(Some(identity.clone()));
        Ok(identity)
    }

    /// Reload every `refresh_interval` until cancelled.
    pub async fn refresh_loop(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; the initial load already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.reload().await {
                tracing::warn!(error = %e, "Identity refresh failed, keeping previous identity");
            }
        }
        tracing::debug!("Identity refresh loop stopped");
    }
}
