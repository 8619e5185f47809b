//! Chart deployment
//!
//! A deploy is repo refresh, chart fetch, then install-or-upgrade with wait.
//! When the wait times out on a request that names a controller service and
//! that service has no external address, the failure is reported as an
//! ingress port conflict: the controller could not bind its host port.

use std::sync::Arc;
use std::time::Duration;

use homeport_core::{ChartRelease, ChartRequest, TelemetrySink};
use homeport_kube::ClusterApi;

use crate::client::{ChartClient, InstallSpec, RepoEntry};
use crate::error::{HelmError, Result};

/// Default wait for chart resources
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// What `remove` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Deploys and removes charts
pub struct ChartDeployer {
    client: Arc<dyn ChartClient>,
    cluster: Arc<dyn ClusterApi>,
    telemetry: Arc<dyn TelemetrySink>,
    timeout: Duration,
}

impl ChartDeployer {
    pub fn new(
        client: Arc<dyn ChartClient>,
        cluster: Arc<dyn ClusterApi>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            client,
            cluster,
            telemetry,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Install or upgrade `request`, waiting for its resources
    pub async fn deploy(&self, request: &ChartRequest) -> Result<ChartRelease> {
        let repo = RepoEntry::new(&request.repo_name, &request.repo_url);
        self.client.add_or_update_repo(&repo).await?;

        let chart_ref = request.chart_ref();
        let chart = self
            .client
            .get_chart(&chart_ref, request.version.as_deref())
            .await?;
        tracing::info!(
            chart = %chart_ref,
            version = %chart.version,
            release = %request.release,
            namespace = %request.namespace,
            "deploying chart"
        );

        let spec = InstallSpec {
            release: request.release.clone(),
            chart_ref,
            version: Some(chart.version.clone()),
            namespace: request.namespace.clone(),
            values: request.values.clone(),
            values_file: request.values_file.clone(),
            timeout: self.timeout,
        };

        let info = match self.client.install_or_upgrade(&spec).await {
            Ok(info) => info,
            Err(e) if e.is_wait_timeout() => return Err(self.reclassify(request, e).await),
            Err(e) => return Err(e),
        };

        self.telemetry
            .attr(&format!("{}_chart_release_name", request.name), &info.name);
        self.telemetry.attr(
            &format!("{}_chart_release_revision", request.name),
            &info.revision.to_string(),
        );
        self.telemetry
            .attr(&format!("{}_chart_version", request.name), &chart.version);

        tracing::info!(
            release = %info.name,
            namespace = %info.namespace,
            revision = info.revision,
            "chart deployed"
        );

        Ok(ChartRelease {
            name: info.name,
            namespace: info.namespace,
            revision: info.revision,
            chart_version: chart.version,
        })
    }

    /// Probe the controller service; no external address means its port never bound
    async fn reclassify(&self, request: &ChartRequest, error: HelmError) -> HelmError {
        let Some(service) = &request.controller_service else {
            return error;
        };

        match self
            .cluster
            .service_external_addresses(&service.namespace, &service.name)
            .await
        {
            Ok(addresses) if addresses.is_empty() => {
                tracing::warn!(
                    release = %request.release,
                    service = %service.name,
                    "controller service has no external address"
                );
                HelmError::IngressPortConflict {
                    release: request.release.clone(),
                    service: service.name.clone(),
                }
            }
            Ok(addresses) => {
                tracing::debug!(service = %service.name, ?addresses, "controller service has addresses");
                error
            }
            Err(e) => {
                tracing::warn!(service = %service.name, error = %e, "failed to inspect controller service");
                error
            }
        }
    }

    /// Uninstall a release; a missing release is not an error
    pub async fn remove(&self, release: &str, namespace: &str) -> Result<RemoveOutcome> {
        match self.client.get_release(release, namespace).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(release, namespace, "release already removed");
                return Ok(RemoveOutcome::NotFound);
            }
            Err(e) => return Err(e),
        }

        match self.client.uninstall(release, namespace).await {
            Ok(()) => {
                tracing::info!(release, namespace, "release removed");
                Ok(RemoveOutcome::Removed)
            }
            Err(e) if e.is_not_found() => Ok(RemoveOutcome::NotFound),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChartClient;
    use homeport_core::{MemoryTelemetry, ServiceRef};
    use homeport_kube::MockClusterApi;

    fn request() -> ChartRequest {
        ChartRequest::new(
            "ingress-nginx",
            "ingress-nginx",
            "https://kubernetes.github.io/ingress-nginx",
            "ingress-nginx",
            "ingress-nginx",
            "ingress-nginx",
        )
        .with_controller_service(ServiceRef::new("ingress-nginx-controller", "ingress-nginx"))
    }

    fn deployer(
        client: &MockChartClient,
        cluster: &MockClusterApi,
        telemetry: &MemoryTelemetry,
    ) -> ChartDeployer {
        ChartDeployer::new(
            Arc::new(client.clone()),
            Arc::new(cluster.clone()),
            Arc::new(telemetry.clone()),
        )
    }

    #[tokio::test]
    async fn test_deploy() {
        let client = MockChartClient::new().with_chart_version("ingress-nginx/ingress-nginx", "4.11.1");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        let release = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap();

        assert_eq!(release.name, "ingress-nginx");
        assert_eq!(release.revision, 1);
        assert_eq!(release.chart_version, "4.11.1");
        assert_eq!(client.repos().len(), 1);
        assert_eq!(
            telemetry.get("ingress-nginx_chart_version").as_deref(),
            Some("4.11.1")
        );
        assert_eq!(
            telemetry.get("ingress-nginx_chart_release_revision").as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_repo_failure_is_fatal() {
        let client = MockChartClient::new().failing_repo("ingress-nginx");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, HelmError::RepoFailed { .. }));
        assert_eq!(client.operation_counts().chart_fetches, 0);
    }

    #[tokio::test]
    async fn test_chart_failure_is_fatal() {
        let client = MockChartClient::new().missing_chart("ingress-nginx/ingress-nginx");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, HelmError::ChartFetchFailed { .. }));
        assert_eq!(client.operation_counts().installs, 0);
    }

    #[tokio::test]
    async fn test_timeout_without_address_is_port_conflict() {
        let client = MockChartClient::new().wait_timeout("ingress-nginx");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, HelmError::IngressPortConflict { .. }));
        assert_eq!(cluster.operation_counts().service_lookups, 1);
    }

    #[tokio::test]
    async fn test_timeout_with_address_stays_timeout() {
        let client = MockChartClient::new().wait_timeout("ingress-nginx");
        let cluster = MockClusterApi::new().with_service_addresses(
            "ingress-nginx",
            "ingress-nginx-controller",
            &["172.18.0.2"],
        );
        let telemetry = MemoryTelemetry::new();

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap_err();
        assert!(err.is_wait_timeout());
    }

    #[tokio::test]
    async fn test_timeout_without_controller_service() {
        let client = MockChartClient::new().wait_timeout("homeport");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();
        let request = ChartRequest::new("homeport", "homeport", "https://x", "homeport", "homeport", "homeport");

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request)
            .await
            .unwrap_err();
        assert!(err.is_wait_timeout());
        assert_eq!(cluster.operation_counts().service_lookups, 0);
    }

    #[tokio::test]
    async fn test_other_install_failure_not_reclassified() {
        let client = MockChartClient::new().failing_install("ingress-nginx");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        let err = deployer(&client, &cluster, &telemetry)
            .deploy(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, HelmError::CommandFailed { .. }));
        assert_eq!(cluster.operation_counts().service_lookups, 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let client = MockChartClient::new().with_release("homeport", "homeport");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();
        let deployer = deployer(&client, &cluster, &telemetry);

        assert_eq!(
            deployer.remove("homeport", "homeport").await.unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(
            deployer.remove("homeport", "homeport").await.unwrap(),
            RemoveOutcome::NotFound
        );
        assert_eq!(client.operation_counts().uninstalls, 1);
    }

    #[tokio::test]
    async fn test_remove_lookup_failure_is_fatal() {
        let client = MockChartClient::new()
            .with_release("homeport", "homeport")
            .failing_lookup("homeport");
        let cluster = MockClusterApi::new();
        let telemetry = MemoryTelemetry::new();

        assert!(deployer(&client, &cluster, &telemetry)
            .remove("homeport", "homeport")
            .await
            .is_err());
        assert!(client.has_release("homeport", "homeport"));
    }
}
