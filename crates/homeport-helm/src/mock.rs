//! Mock chart client for testing
//!
//! Keeps releases in memory and can be told to fail specific steps.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::client::{ChartClient, ChartMetadata, InstallSpec, ReleaseInfo, RepoEntry};
use crate::error::{HelmError, Result};

const DEFAULT_CHART_VERSION: &str = "1.0.0";

/// In-memory chart client for testing
#[derive(Clone)]
pub struct MockChartClient {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

#[derive(Default)]
struct MockState {
    repos: Vec<RepoEntry>,
    chart_versions: HashMap<String, String>,
    releases: HashMap<(String, String), ReleaseInfo>,
    /// Install order, by release name
    installs: Vec<String>,
    failing_repos: HashSet<String>,
    missing_charts: HashSet<String>,
    wait_timeouts: HashSet<String>,
    failing_installs: HashSet<String>,
    failing_lookups: HashSet<String>,
    hanging_uninstalls: HashSet<String>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub repo_updates: usize,
    pub chart_fetches: usize,
    pub installs: usize,
    pub release_lookups: usize,
    pub uninstalls: usize,
}

impl MockChartClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// Latest version reported for `chart_ref`
    pub fn with_chart_version(self, chart_ref: &str, version: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .chart_versions
            .insert(chart_ref.to_string(), version.to_string());
        self
    }

    /// Seed an existing release
    pub fn with_release(self, release: &str, namespace: &str) -> Self {
        self.state.write().unwrap().releases.insert(
            (namespace.to_string(), release.to_string()),
            ReleaseInfo {
                name: release.to_string(),
                namespace: namespace.to_string(),
                revision: 1,
                chart_version: DEFAULT_CHART_VERSION.to_string(),
                status: "deployed".to_string(),
            },
        );
        self
    }

    /// Adding this repository fails
    pub fn failing_repo(self, name: &str) -> Self {
        self.state.write().unwrap().failing_repos.insert(name.to_string());
        self
    }

    /// Fetching this chart fails
    pub fn missing_chart(self, chart_ref: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .missing_charts
            .insert(chart_ref.to_string());
        self
    }

    /// Installing this release times out waiting
    pub fn wait_timeout(self, release: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .wait_timeouts
            .insert(release.to_string());
        self
    }

    /// Installing this release fails outright
    pub fn failing_install(self, release: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .failing_installs
            .insert(release.to_string());
        self
    }

    /// Looking up this release fails with something other than not-found
    pub fn failing_lookup(self, release: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .failing_lookups
            .insert(release.to_string());
        self
    }

    /// Uninstalling this release never returns
    pub fn hanging_uninstall(self, release: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .hanging_uninstalls
            .insert(release.to_string());
        self
    }

    /// Whether the release currently exists
    pub fn has_release(&self, release: &str, namespace: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .releases
            .contains_key(&(namespace.to_string(), release.to_string()))
    }

    /// Release names in install order
    pub fn install_order(&self) -> Vec<String> {
        self.state.read().unwrap().installs.clone()
    }

    /// Repositories registered so far
    pub fn repos(&self) -> Vec<RepoEntry> {
        self.state.read().unwrap().repos.clone()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

impl Default for MockChartClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartClient for MockChartClient {
    async fn add_or_update_repo(&self, repo: &RepoEntry) -> Result<()> {
        self.operations.write().unwrap().repo_updates += 1;

        let mut state = self.state.write().unwrap();
        if state.failing_repos.contains(&repo.name) {
            return Err(HelmError::RepoFailed {
                name: repo.name.clone(),
                url: repo.url.clone(),
                message: "looks like the repository is not a valid chart repository".to_string(),
            });
        }
        if !state.repos.contains(repo) {
            state.repos.push(repo.clone());
        }
        Ok(())
    }

    async fn get_chart(&self, chart_ref: &str, version: Option<&str>) -> Result<ChartMetadata> {
        self.operations.write().unwrap().chart_fetches += 1;

        let state = self.state.read().unwrap();
        if state.missing_charts.contains(chart_ref) {
            return Err(HelmError::ChartFetchFailed {
                chart: chart_ref.to_string(),
                message: "chart not found".to_string(),
            });
        }

        let version = version
            .map(str::to_string)
            .or_else(|| state.chart_versions.get(chart_ref).cloned())
            .unwrap_or_else(|| DEFAULT_CHART_VERSION.to_string());
        let name = chart_ref
            .rsplit('/')
            .next()
            .unwrap_or(chart_ref)
            .to_string();

        Ok(ChartMetadata {
            name,
            version: version.clone(),
            app_version: Some(version),
        })
    }

    async fn install_or_upgrade(&self, spec: &InstallSpec) -> Result<ReleaseInfo> {
        self.operations.write().unwrap().installs += 1;

        let mut state = self.state.write().unwrap();
        if state.wait_timeouts.contains(&spec.release) {
            return Err(HelmError::WaitTimeout {
                release: spec.release.clone(),
                namespace: spec.namespace.clone(),
                message: "client rate limiter Wait returned an error: context deadline exceeded"
                    .to_string(),
            });
        }
        if state.failing_installs.contains(&spec.release) {
            return Err(HelmError::CommandFailed {
                command: format!("helm upgrade --install {}", spec.release),
                stderr: "INSTALLATION FAILED".to_string(),
            });
        }

        let key = (spec.namespace.clone(), spec.release.clone());
        let revision = state.releases.get(&key).map(|r| r.revision + 1).unwrap_or(1);
        let info = ReleaseInfo {
            name: spec.release.clone(),
            namespace: spec.namespace.clone(),
            revision,
            chart_version: spec
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_CHART_VERSION.to_string()),
            status: "deployed".to_string(),
        };
        state.releases.insert(key, info.clone());
        state.installs.push(spec.release.clone());
        Ok(info)
    }

    async fn get_release(&self, release: &str, namespace: &str) -> Result<ReleaseInfo> {
        self.operations.write().unwrap().release_lookups += 1;

        let state = self.state.read().unwrap();
        if state.failing_lookups.contains(release) {
            return Err(HelmError::CommandFailed {
                command: format!("helm status {}", release),
                stderr: "Kubernetes cluster unreachable".to_string(),
            });
        }
        state
            .releases
            .get(&(namespace.to_string(), release.to_string()))
            .cloned()
            .ok_or_else(|| HelmError::ReleaseNotFound {
                release: release.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.operations.write().unwrap().uninstalls += 1;

        let hanging = self.state.read().unwrap().hanging_uninstalls.contains(release);
        if hanging {
            std::future::pending::<()>().await;
        }

        self.state
            .write()
            .unwrap()
            .releases
            .remove(&(namespace.to_string(), release.to_string()))
            .map(|_| ())
            .ok_or_else(|| HelmError::ReleaseNotFound {
                release: release.to_string(),
                namespace: namespace.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(release: &str) -> InstallSpec {
        InstallSpec {
            release: release.to_string(),
            chart_ref: format!("{}/{}", release, release),
            version: None,
            namespace: release.to_string(),
            values: Vec::new(),
            values_file: None,
            timeout: Duration::from_secs(600),
        }
    }

    #[tokio::test]
    async fn test_install_upgrade_uninstall() {
        let client = MockChartClient::new();

        assert_eq!(client.install_or_upgrade(&spec("app")).await.unwrap().revision, 1);
        assert_eq!(client.install_or_upgrade(&spec("app")).await.unwrap().revision, 2);
        assert_eq!(client.get_release("app", "app").await.unwrap().revision, 2);

        client.uninstall("app", "app").await.unwrap();
        assert!(client.get_release("app", "app").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_chart_versions() {
        let client = MockChartClient::new().with_chart_version("r/c", "2.0.0");
        assert_eq!(client.get_chart("r/c", None).await.unwrap().version, "2.0.0");
        assert_eq!(client.get_chart("r/c", Some("1.5.0")).await.unwrap().version, "1.5.0");
        assert_eq!(client.get_chart("r/other", None).await.unwrap().name, "other");
    }
}
