//! Construction of external clients
//!
//! The cluster API and chart clients can only be built once the cluster (and
//! its kubeconfig) exists, so the orchestrator asks a factory for them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use homeport_core::Provider;
use homeport_docker::{DockerCli, DockerError, EngineClient};
use homeport_helm::{ChartClient, HelmCli};
use homeport_kube::{ClusterApi, KubeClusterApi, KubeError};

/// Builds the clients the orchestrator talks through
#[async_trait]
pub trait ClientFactory: Send + Sync {
    fn engine(&self) -> Result<Arc<dyn EngineClient>, DockerError>;

    async fn cluster_api(&self, provider: &Provider) -> Result<Arc<dyn ClusterApi>, KubeError>;

    fn chart_client(&self, provider: &Provider) -> Arc<dyn ChartClient>;
}

/// Real clients: the `docker` and `helm` binaries and a kube client
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClients;

#[async_trait]
impl ClientFactory for SystemClients {
    fn engine(&self) -> Result<Arc<dyn EngineClient>, DockerError> {
        Ok(Arc::new(DockerCli::connect()?))
    }

    async fn cluster_api(&self, provider: &Provider) -> Result<Arc<dyn ClusterApi>, KubeError> {
        let client = homeport_kube::create_client(&provider.kubeconfig, &provider.context).await?;
        Ok(Arc::new(KubeClusterApi::new(client)))
    }

    fn chart_client(&self, provider: &Provider) -> Arc<dyn ChartClient> {
        Arc::new(HelmCli::new().with_kubeconfig(&provider.kubeconfig, &provider.context))
    }
}

/// Hands out pre-built clients
#[derive(Clone)]
pub struct StaticClients {
    engine: Option<Arc<dyn EngineClient>>,
    cluster: Option<Arc<dyn ClusterApi>>,
    charts: Arc<dyn ChartClient>,
    engine_builds: Arc<AtomicUsize>,
}

impl StaticClients {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        cluster: Arc<dyn ClusterApi>,
        charts: Arc<dyn ChartClient>,
    ) -> Self {
        Self {
            engine: Some(engine),
            cluster: Some(cluster),
            charts,
            engine_builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Engine client construction fails
    pub fn without_engine(mut self) -> Self {
        self.engine = None;
        self
    }

    /// Cluster API connection fails
    pub fn without_cluster_api(mut self) -> Self {
        self.cluster = None;
        self
    }

    /// How many times an engine client was requested
    pub fn engine_builds(&self) -> usize {
        self.engine_builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for StaticClients {
    fn engine(&self) -> Result<Arc<dyn EngineClient>, DockerError> {
        self.engine_builds.fetch_add(1, Ordering::SeqCst);
        self.engine.clone().ok_or_else(|| DockerError::NotInstalled {
            binary: "docker".to_string(),
        })
    }

    async fn cluster_api(&self, provider: &Provider) -> Result<Arc<dyn ClusterApi>, KubeError> {
        self.cluster.clone().ok_or_else(|| KubeError::Kubeconfig {
            path: provider.kubeconfig.display().to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn chart_client(&self, _provider: &Provider) -> Arc<dyn ChartClient> {
        self.charts.clone()
    }
}
