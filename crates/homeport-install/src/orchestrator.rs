//! Install and uninstall state machines
//!
//! Install walks `PreflightPending -> ClusterPending -> ChartsDeploying ->
//! CredentialsPending -> IngressPending -> LivenessPending -> Done` and stops
//! at the first error without rolling back. Uninstall walks
//! `PreflightPending -> ClusterLookup -> ReleasesRemoving -> ClusterDeleting ->
//! DataRemoving -> Done` and only treats the engine check, the cluster lookup
//! and the cluster deletion as fatal.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use homeport_core::{
    ChartRelease, IngressRuleSet, NoopTelemetry, Provider, ServiceRef, Settings, StepOutcome,
    StepReporter, TelemetrySink, TracingReporter,
};
use homeport_helm::{ChartDeployer, HelmError};
use homeport_kube::{CredentialManager, IngressManager, NamespaceWait};
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterGateway, Mount, STORAGE_MOUNT_PATH};
use crate::clients::ClientFactory;
use crate::error::{InstallError, Result};
use crate::liveness::{BrowserLauncher, LaunchOutcome, LivenessGate};
use crate::port::PortResolver;
use crate::preflight::{PortStatus, PreflightChecker};
use crate::sweep::{ReleaseTarget, UninstallSweep};

/// Logical chart names used in logs and telemetry keys
const APP_CHART: &str = "homeport";
const INGRESS_CHART: &str = "ingress-nginx";

/// Where an install is, or where it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallState {
    PreflightPending,
    ClusterPending,
    ChartsDeploying,
    CredentialsPending,
    IngressPending,
    LivenessPending,
    Done,
    Failed(String),
}

impl InstallState {
    /// Step name reported for this state
    pub fn step(&self) -> &'static str {
        match self {
            Self::PreflightPending => "preflight",
            Self::ClusterPending => "cluster",
            Self::ChartsDeploying => "charts",
            Self::CredentialsPending => "credentials",
            Self::IngressPending => "ingress",
            Self::LivenessPending => "liveness",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// Where an uninstall is, or where it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallState {
    PreflightPending,
    ClusterLookup,
    ReleasesRemoving,
    ClusterDeleting,
    DataRemoving,
    Done,
    Failed(String),
}

impl UninstallState {
    /// Step name reported for this state
    pub fn step(&self) -> &'static str {
        match self {
            Self::PreflightPending => "preflight",
            Self::ClusterLookup => "cluster",
            Self::ReleasesRemoving => "releases",
            Self::ClusterDeleting => "cluster delete",
            Self::DataRemoving => "data",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// A state machine position that names the step it reports under
trait Phase {
    fn step(&self) -> &'static str;
    fn failed(reason: String) -> Self;
}

impl Phase for InstallState {
    fn step(&self) -> &'static str {
        InstallState::step(self)
    }

    fn failed(reason: String) -> Self {
        Self::Failed(reason)
    }
}

impl Phase for UninstallState {
    fn step(&self) -> &'static str {
        UninstallState::step(self)
    }

    fn failed(reason: String) -> Self {
        Self::Failed(reason)
    }
}

/// Basic-auth credentials for the web front end
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Install parameters
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Requested ingress port
    pub port: u16,
    pub credentials: Credentials,
    /// Hosts routed in addition to `localhost` and the host alias
    pub hosts: Vec<String>,
    /// Application chart version (latest when unset)
    pub chart_version: Option<String>,
    /// Extra `key=value` overrides for the application chart
    pub values: Vec<String>,
    pub values_file: Option<PathBuf>,
    /// Verify liveness but do not open a browser
    pub no_browser: bool,
}

impl InstallOptions {
    pub fn new(port: u16, credentials: Credentials) -> Self {
        Self {
            port,
            credentials,
            hosts: Vec::new(),
            chart_version: None,
            values: Vec::new(),
            values_file: None,
            no_browser: false,
        }
    }
}

/// Uninstall parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Keep the local data directory
    pub persisted: bool,
}

/// Result of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub state: InstallState,
    /// Port the ingress answers on
    pub port: u16,
    pub cluster_created: bool,
    pub releases: Vec<ChartRelease>,
    pub launch: LaunchOutcome,
    pub steps: Vec<StepOutcome>,
}

impl InstallOutcome {
    pub fn url(&self) -> &str {
        self.launch.url()
    }
}

/// Result of a successful uninstall
#[derive(Debug, Clone)]
pub struct UninstallOutcome {
    pub state: UninstallState,
    /// Whether there was a cluster to remove
    pub cluster_existed: bool,
    pub data_removed: bool,
    pub steps: Vec<StepOutcome>,
}

/// Step bookkeeping shared by install and uninstall
struct Progress<'a, S> {
    reporter: &'a dyn StepReporter,
    state: S,
    steps: Vec<StepOutcome>,
}

impl<'a, S: Phase> Progress<'a, S> {
    fn new(reporter: &'a dyn StepReporter, initial: S) -> Self {
        Self {
            reporter,
            state: initial,
            steps: Vec::new(),
        }
    }

    fn enter(&mut self, state: S) {
        tracing::debug!(from = self.state.step(), to = state.step(), "state");
        self.state = state;
    }

    fn record(&mut self, outcome: StepOutcome) {
        self.reporter.report(&outcome);
        self.steps.push(outcome);
    }

    fn ok(&mut self, message: impl Into<String>) {
        self.record(StepOutcome::ok(self.state.step(), message));
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.record(StepOutcome::warn(self.state.step(), message));
    }

    fn fail(&mut self, error: InstallError) -> InstallError {
        self.record(StepOutcome::fail(self.state.step(), error.to_string()));
        self.state = S::failed(error.to_string());
        error
    }
}

/// Drives install and uninstall against the configured provider
pub struct Orchestrator {
    settings: Settings,
    provider: Provider,
    clients: Arc<dyn ClientFactory>,
    gateway: Arc<dyn ClusterGateway>,
    telemetry: Arc<dyn TelemetrySink>,
    reporter: Arc<dyn StepReporter>,
    cancel: CancellationToken,
    bcrypt_cost: Option<u32>,
    probe_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        provider: Provider,
        clients: Arc<dyn ClientFactory>,
        gateway: Arc<dyn ClusterGateway>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            provider,
            clients,
            gateway,
            telemetry: Arc::new(NoopTelemetry),
            reporter: Arc::new(TracingReporter),
            cancel,
            bcrypt_cost: None,
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn StepReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// bcrypt cost for the basic-auth hash
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = Some(cost);
        self
    }

    /// Bound the HTTP probe of an occupied port
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Abort `fut` when the orchestrator is cancelled
    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(InstallError::Cancelled),
            result = fut => result,
        }
    }

    fn preflight(&self) -> PreflightChecker {
        PreflightChecker::new(
            self.clients.clone(),
            self.telemetry.clone(),
            &self.settings.marker,
        )
        .with_probe_timeout(self.probe_timeout)
    }

    fn cluster_error(&self, operation: &str, source: crate::cluster::ClusterError) -> InstallError {
        InstallError::ClusterOperationFailed {
            cluster: self.provider.cluster_name.clone(),
            operation: operation.to_string(),
            source,
        }
    }

    fn deployer(&self, cluster: Arc<dyn homeport_kube::ClusterApi>) -> ChartDeployer {
        ChartDeployer::new(
            self.clients.chart_client(&self.provider),
            cluster,
            self.telemetry.clone(),
        )
        .with_timeout(self.settings.chart_timeout)
    }

    /// Install, or reinstall over a previous run
    pub async fn install(
        &self,
        options: &InstallOptions,
        launcher: &dyn BrowserLauncher,
    ) -> Result<InstallOutcome> {
        let mut progress = Progress::new(self.reporter.as_ref(), InstallState::PreflightPending);
        tracing::info!(
            provider = %self.provider.name,
            cluster = %self.provider.cluster_name,
            port = options.port,
            "starting install"
        );

        self.settings
            .validate()
            .map_err(|e| progress.fail(e.into()))?;
        let rules = IngressRuleSet::for_hosts(&self.settings.web_service, &options.hosts)
            .map_err(|e| progress.fail(e.into()))?;

        // Preflight
        let preflight = self.preflight();
        let engine = self
            .cancellable(preflight.check_container_engine())
            .await
            .map_err(|e| progress.fail(e))?;
        progress.ok(format!(
            "container engine {} ({}/{})",
            engine.version, engine.os, engine.arch
        ));

        let exists = self
            .cancellable(async {
                self.gateway
                    .exists()
                    .await
                    .map_err(|e| self.cluster_error("lookup", e))
            })
            .await
            .map_err(|e| progress.fail(e))?;

        let port = if exists && self.provider.pins_port {
            let engine = self
                .cancellable(preflight.engine())
                .await
                .map_err(|e| progress.fail(e))?;
            let bound = self
                .cancellable(PortResolver::new(engine).resolve_bound_port(&self.provider))
                .await
                .map_err(|e| progress.fail(e))?;
            if bound != options.port {
                progress.warn(format!(
                    "cluster '{}' is bound to port {}; using it instead of {}",
                    self.provider.cluster_name, bound, options.port
                ));
            }
            bound
        } else {
            options.port
        };

        match self.cancellable(preflight.check_port_available(port)).await {
            Ok(PortStatus::Free) => progress.ok(format!("port {} available", port)),
            Ok(PortStatus::Privileged) => {
                progress.ok(format!("port {} is privileged, not probed", port))
            }
            Ok(PortStatus::ServedByHomeport) => {
                progress.ok(format!("port {} served by an existing homeport install", port))
            }
            // the reused cluster holds the port even while its ingress is down
            Err(InstallError::PortUnavailable { .. }) if exists => progress.warn(format!(
                "port {} is held but not answering as homeport; continuing with cluster '{}'",
                port, self.provider.cluster_name
            )),
            Err(e) => return Err(progress.fail(e)),
        }
        self.telemetry.attr("ingress_port", &port.to_string());

        // Cluster
        progress.enter(InstallState::ClusterPending);
        if exists {
            progress.ok(format!("using existing cluster '{}'", self.provider.cluster_name));
        } else {
            let data_dir = self.settings.data_dir().map_err(|e| progress.fail(e.into()))?;
            tokio::fs::create_dir_all(&data_dir)
                .await
                .map_err(|e| progress.fail(InstallError::io(&data_dir, e)))?;

            let mounts = [Mount::new(&data_dir, STORAGE_MOUNT_PATH)];
            self.cancellable(async {
                self.gateway
                    .create(port, &mounts)
                    .await
                    .map_err(|e| self.cluster_error("create", e))
            })
            .await
            .map_err(|e| progress.fail(e))?;
            progress.ok(format!(
                "created cluster '{}' with ingress on port {}",
                self.provider.cluster_name, port
            ));
        }

        let cluster = self
            .cancellable(async {
                let api = self
                    .clients
                    .cluster_api(&self.provider)
                    .await
                    .map_err(|e| InstallError::cluster_api("connect", e))?;
                let version = api
                    .server_version()
                    .await
                    .map_err(|e| InstallError::cluster_api("server version", e))?;
                Ok((api, version))
            })
            .await
            .map_err(|e| progress.fail(e))?;
        let (cluster, server_version) = cluster;
        tracing::debug!(%server_version, "cluster API reachable");
        self.telemetry.attr("k8s_version", &server_version);

        // Charts
        progress.enter(InstallState::ChartsDeploying);
        let deployer = self.deployer(cluster.clone());
        let namespace = self.settings.namespace().to_string();

        let app = self
            .settings
            .app_chart
            .request(APP_CHART)
            .with_version(options.chart_version.clone())
            .with_values(options.values.iter().cloned())
            .with_values_file(options.values_file.clone());
        let ingress = self
            .settings
            .ingress_chart
            .request(INGRESS_CHART)
            .with_values(self.provider.ingress_values.iter().cloned())
            .with_controller_service(ServiceRef::new(
                &self.settings.controller_service,
                &self.settings.ingress_chart.namespace,
            ));

        let mut releases = Vec::new();
        for request in [&app, &ingress] {
            let release = self
                .cancellable(async {
                    deployer
                        .deploy(request)
                        .await
                        .map_err(|e| chart_error(&request.name, port, e))
                })
                .await
                .map_err(|e| progress.fail(e))?;
            progress.ok(format!(
                "deployed {} {} (revision {})",
                release.name, release.chart_version, release.revision
            ));
            releases.push(release);
        }

        // Credentials
        progress.enter(InstallState::CredentialsPending);
        let mut credentials = CredentialManager::new(cluster.clone(), &self.settings.auth_secret);
        if let Some(cost) = self.bcrypt_cost {
            credentials = credentials.with_cost(cost);
        }
        self.cancellable(async {
            credentials
                .ensure_basic_auth(
                    &namespace,
                    &options.credentials.username,
                    &options.credentials.password,
                )
                .await
                .map_err(|e| InstallError::cluster_api("write basic-auth secret", e))
        })
        .await
        .map_err(|e| progress.fail(e))?;
        progress.ok(format!(
            "basic auth configured for '{}'",
            options.credentials.username
        ));

        // Ingress
        progress.enter(InstallState::IngressPending);
        let ingress_manager = IngressManager::new(
            cluster.clone(),
            &self.settings.ingress_name,
            &self.settings.auth_secret,
            &self.settings.marker,
        );
        self.cancellable(async {
            ingress_manager
                .ensure_ingress(&namespace, &rules)
                .await
                .map_err(|e| InstallError::cluster_api("apply ingress", e))
        })
        .await
        .map_err(|e| progress.fail(e))?;
        progress.ok(format!("ingress routes {}", rules.hosts().join(", ")));

        // Liveness
        progress.enter(InstallState::LivenessPending);
        let url = format!("http://localhost:{}", port);
        let gate = LivenessGate::new(&self.settings.marker, self.cancel.clone())
            .with_interval(self.settings.poll_interval)
            .with_timeout(self.settings.liveness_timeout);

        let launch = if options.no_browser {
            gate.wait_ready(&url).await.map_err(|e| progress.fail(e))?;
            LaunchOutcome::Skipped { url }
        } else {
            gate.wait_ready_then_launch(&url, launcher)
                .await
                .map_err(|e| progress.fail(e))?
        };
        match &launch {
            LaunchOutcome::Manual { url, reason } => {
                progress.warn(format!("could not open a browser ({}); open {}", reason, url))
            }
            other => progress.ok(format!("ready at {}", other.url())),
        }

        progress.enter(InstallState::Done);
        tracing::info!(port, "install complete");

        Ok(InstallOutcome {
            state: progress.state,
            port,
            cluster_created: !exists,
            releases,
            launch,
            steps: progress.steps,
        })
    }

    /// Remove everything an install created
    pub async fn uninstall(&self, options: &UninstallOptions) -> Result<UninstallOutcome> {
        let mut progress = Progress::new(self.reporter.as_ref(), UninstallState::PreflightPending);
        tracing::info!(cluster = %self.provider.cluster_name, "starting uninstall");

        self.settings
            .validate()
            .map_err(|e| progress.fail(e.into()))?;
        let preflight = self.preflight();
        let engine = self
            .cancellable(preflight.check_container_engine())
            .await
            .map_err(|e| progress.fail(e))?;
        progress.ok(format!("container engine {}", engine.version));

        progress.enter(UninstallState::ClusterLookup);
        let exists = self
            .cancellable(async {
                self.gateway
                    .exists()
                    .await
                    .map_err(|e| self.cluster_error("lookup", e))
            })
            .await
            .map_err(|e| progress.fail(e))?;

        if !exists {
            progress.ok(format!(
                "cluster '{}' not found; nothing to uninstall",
                self.provider.cluster_name
            ));
            progress.enter(UninstallState::Done);
            return Ok(UninstallOutcome {
                state: progress.state,
                cluster_existed: false,
                data_removed: false,
                steps: progress.steps,
            });
        }

        progress.enter(UninstallState::ReleasesRemoving);
        let cluster = self
            .cancellable(async {
                self.clients
                    .cluster_api(&self.provider)
                    .await
                    .map_err(|e| InstallError::cluster_api("connect", e))
            })
            .await;
        match cluster {
            Ok(cluster) => {
                let sweep = UninstallSweep::new(
                    self.deployer(cluster.clone()),
                    cluster,
                    ReleaseTarget::new(
                        &self.settings.app_chart.release,
                        &self.settings.app_chart.namespace,
                    ),
                    ReleaseTarget::new(
                        &self.settings.ingress_chart.release,
                        &self.settings.ingress_chart.namespace,
                    ),
                    self.settings.namespace(),
                    NamespaceWait {
                        interval: self.settings.poll_interval,
                        timeout: self.settings.namespace_delete_timeout,
                    },
                    self.cancel.clone(),
                );
                let outcomes = sweep
                    .run(self.reporter.as_ref())
                    .await
                    .map_err(|e| progress.fail(e))?;
                progress.steps.extend(outcomes);
            }
            Err(InstallError::Cancelled) => return Err(progress.fail(InstallError::Cancelled)),
            Err(e) => progress.warn(format!(
                "cannot reach cluster API, skipping release removal: {}",
                e
            )),
        }

        progress.enter(UninstallState::ClusterDeleting);
        self.cancellable(async {
            self.gateway
                .delete()
                .await
                .map_err(|e| self.cluster_error("delete", e))
        })
        .await
        .map_err(|e| progress.fail(e))?;
        progress.ok(format!("deleted cluster '{}'", self.provider.cluster_name));

        let data_removed = if options.persisted {
            false
        } else {
            progress.enter(UninstallState::DataRemoving);
            self.remove_data_dir(&mut progress).await
        };

        progress.enter(UninstallState::Done);
        tracing::info!("uninstall complete");
        Ok(UninstallOutcome {
            state: progress.state,
            cluster_existed: true,
            data_removed,
            steps: progress.steps,
        })
    }

    async fn remove_data_dir(&self, progress: &mut Progress<'_, UninstallState>) -> bool {
        let data_dir = match self.settings.data_dir() {
            Ok(dir) => dir,
            Err(e) => {
                progress.warn(format!("cannot locate data directory: {}", e));
                return false;
            }
        };

        if !tokio::fs::try_exists(&data_dir).await.unwrap_or(false) {
            return false;
        }

        match tokio::fs::remove_dir_all(&data_dir).await {
            Ok(()) => {
                progress.ok(format!("removed {}", data_dir.display()));
                true
            }
            Err(e) => {
                progress.warn(format!("failed to remove {}: {}", data_dir.display(), e));
                false
            }
        }
    }
}

fn chart_error(chart: &str, port: u16, error: HelmError) -> InstallError {
    match error {
        HelmError::IngressPortConflict { .. } => InstallError::IngressPortConflict { port },
        source => InstallError::ChartDeployFailed {
            chart: chart.to_string(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_steps() {
        assert_eq!(InstallState::PreflightPending.step(), "preflight");
        assert_eq!(InstallState::LivenessPending.step(), "liveness");
        assert_eq!(InstallState::Failed("x".to_string()).step(), "failed");
        assert_eq!(UninstallState::ReleasesRemoving.step(), "releases");
        assert_eq!(UninstallState::DataRemoving.step(), "data");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_port_conflict_mapping() {
        let err = chart_error(
            "ingress-nginx",
            8000,
            HelmError::IngressPortConflict {
                release: "ingress-nginx".to_string(),
                service: "ingress-nginx-controller".to_string(),
            },
        );
        assert!(matches!(err, InstallError::IngressPortConflict { port: 8000 }));

        let err = chart_error(
            "homeport",
            8000,
            HelmError::ReleaseNotFound {
                release: "homeport".to_string(),
                namespace: "homeport".to_string(),
            },
        );
        assert!(matches!(err, InstallError::ChartDeployFailed { chart, .. } if chart == "homeport"));
    }
}
