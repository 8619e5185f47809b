//! Chart client trait and the data it exchanges

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A chart repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub url: String,
}

impl RepoEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Chart metadata (`Chart.yaml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Install-or-upgrade parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub release: String,

    /// `repo/chart`
    pub chart_ref: String,

    pub version: Option<String>,

    pub namespace: String,

    /// Ordered `key=value` overrides
    pub values: Vec<String>,

    pub values_file: Option<PathBuf>,

    /// How long to wait for resources to become ready
    pub timeout: Duration,
}

/// A deployed release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub chart_version: String,
    pub status: String,
}

/// Package manager capabilities used by the install engine
#[async_trait]
pub trait ChartClient: Send + Sync {
    /// Register the repository, or refresh it when already present
    async fn add_or_update_repo(&self, repo: &RepoEntry) -> Result<()>;

    /// Fetch chart metadata, latest version unless `version` is set
    async fn get_chart(&self, chart_ref: &str, version: Option<&str>) -> Result<ChartMetadata>;

    /// Install the release, or upgrade it when it exists; waits for readiness
    async fn install_or_upgrade(&self, spec: &InstallSpec) -> Result<ReleaseInfo>;

    /// Look up a release; `HelmError::ReleaseNotFound` when absent
    async fn get_release(&self, release: &str, namespace: &str) -> Result<ReleaseInfo>;

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()>;
}
