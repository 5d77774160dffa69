//! Fetch data sources.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A configuration snapshot. Consumers key behaviour off `version`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationInfo {
    pub version: String,
    pub settings: BTreeMap<String, String>,
    pub endpoints: Vec<ServiceEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration snapshot has no version")]
    MissingVersion,

    #[error("Source error: {0}")]
    Source(String),
}

/// Where snapshots come from.
#[async_trait]
pub trait FetcherDataSource: Send + Sync {
    async fn fetch(&self) -> Result<ConfigurationInfo, FetchError>;
}

/// Reads a JSON snapshot from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    /// Source reading a JSON snapshot from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FetcherDataSource for FileDataSource {
    async fn fetch(&self) -> Result<ConfigurationInfo, FetchError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let info: ConfigurationInfo = serde_json::from_str(&content)?;
        if info.version.is_empty() {
            return Err(FetchError::MissingVersion);
        }
        Ok(info)
    }
}
