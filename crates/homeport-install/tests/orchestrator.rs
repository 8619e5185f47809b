//! End-to-end install and uninstall runs against in-memory clients

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use homeport_core::{MemoryReporter, MemoryTelemetry, Provider, Settings, StepStatus};
use homeport_docker::{ContainerInspect, MockEngineClient, PortBinding};
use homeport_helm::MockChartClient;
use homeport_install::{
    Credentials, InstallError, InstallOptions, InstallState, LaunchOutcome, MockClusterGateway,
    Mount, Orchestrator, RecordingBrowser, STORAGE_MOUNT_PATH, StaticClients, UninstallOptions,
    UninstallState,
};
use homeport_kube::{AUTH_KEY, MockClusterApi};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const REALM: &str = "Basic realm=\"homeport - authentication required\"";

struct Harness {
    _dir: TempDir,
    data_dir: PathBuf,
    engine: MockEngineClient,
    cluster: MockClusterApi,
    charts: MockChartClient,
    gateway: MockClusterGateway,
    reporter: MemoryReporter,
    telemetry: MemoryTelemetry,
    cancel: CancellationToken,
    settings: Settings,
    cluster_api_down: bool,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let settings = Settings {
            data_dir: Some(data_dir.clone()),
            kubeconfig: Some(dir.path().join("homeport.kubeconfig")),
            poll_interval: Duration::from_millis(20),
            liveness_timeout: Duration::from_secs(2),
            namespace_delete_timeout: Duration::from_millis(500),
            ..Default::default()
        };

        Self {
            _dir: dir,
            data_dir,
            engine: MockEngineClient::new(),
            cluster: MockClusterApi::new(),
            charts: MockChartClient::new(),
            gateway: MockClusterGateway::new(),
            reporter: MemoryReporter::new(),
            telemetry: MemoryTelemetry::new(),
            cancel: CancellationToken::new(),
            settings,
            cluster_api_down: false,
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        let kubeconfig = self.settings.kubeconfig().unwrap();
        let provider = Provider::kind(&self.settings.cluster_name, kubeconfig);
        let mut clients = StaticClients::new(
            Arc::new(self.engine.clone()),
            Arc::new(self.cluster.clone()),
            Arc::new(self.charts.clone()),
        );
        if self.cluster_api_down {
            clients = clients.without_cluster_api();
        }

        Orchestrator::new(
            self.settings.clone(),
            provider,
            Arc::new(clients),
            Arc::new(self.gateway.clone()),
            self.cancel.clone(),
        )
        .with_reporter(Arc::new(self.reporter.clone()))
        .with_telemetry(Arc::new(self.telemetry.clone()))
        .with_bcrypt_cost(4)
        .with_probe_timeout(Duration::from_millis(300))
    }
}

/// Engine whose control-plane container publishes port 80 on `port`
fn engine_bound_to(port: u16) -> MockEngineClient {
    MockEngineClient::new().with_container(
        ContainerInspect::new("homeport-control-plane", "running")
            .with_binding("6443/tcp", PortBinding::new("127.0.0.1", "40123"))
            .with_binding("80/tcp", PortBinding::new("0.0.0.0", port.to_string())),
    )
}

fn options(port: u16) -> InstallOptions {
    InstallOptions::new(port, Credentials::new("admin", "s3cret"))
}

/// Server whose first answer is our auth challenge (the port probe), then 200
async fn ingress_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", REALM))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fresh_install() {
    let server = ingress_server().await;
    let port = server.address().port();
    let h = Harness::new();
    let browser = RecordingBrowser::new();

    let outcome = h
        .orchestrator()
        .install(&options(port), &browser)
        .await
        .unwrap();

    let url = format!("http://localhost:{}", port);
    assert_eq!(outcome.state, InstallState::Done);
    assert_eq!(outcome.port, port);
    assert!(outcome.cluster_created);
    assert_eq!(outcome.launch, LaunchOutcome::Launched { url: url.clone() });
    assert_eq!(browser.launched(), vec![url]);

    // cluster created on the requested port with the data directory mounted
    assert_eq!(
        h.gateway.creates(),
        vec![(port, vec![Mount::new(&h.data_dir, STORAGE_MOUNT_PATH)])]
    );
    assert!(h.data_dir.is_dir());

    // application chart first, then the ingress controller
    assert_eq!(h.charts.install_order(), vec!["homeport", "ingress-nginx"]);
    assert_eq!(outcome.releases.len(), 2);

    let secret = h.cluster.secret("homeport", "homeport-basic-auth").unwrap();
    let line = String::from_utf8(secret.data.unwrap()[AUTH_KEY].0.clone()).unwrap();
    assert!(line.starts_with("admin:"));
    assert!(h.cluster.ingress("homeport", "homeport-ingress").is_some());

    assert!(h.reporter.with_status(StepStatus::Fail).is_empty());
    assert_eq!(h.telemetry.get("docker_version").as_deref(), Some("27.0.3"));
    assert_eq!(
        h.telemetry.get("homeport_chart_release_name").as_deref(),
        Some("homeport")
    );
}

#[tokio::test]
async fn test_reinstall_uses_bound_port() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let bound = server.address().port();

    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    h.engine = engine_bound_to(bound);
    let browser = RecordingBrowser::new();
    let requested = if bound == 8000 { 8001 } else { 8000 };

    let orchestrator = h.orchestrator();
    let first = orchestrator.install(&options(requested), &browser).await.unwrap();
    let second = orchestrator.install(&options(requested), &browser).await.unwrap();

    assert_eq!(first.port, bound);
    assert!(!first.cluster_created);
    assert!(h.gateway.creates().is_empty());
    let warnings = h.reporter.with_status(StepStatus::Warn);
    assert!(warnings.iter().any(|o| o.message.contains(&bound.to_string())));
    // the port answers, but not with our challenge; the reused cluster keeps it
    assert!(warnings
        .iter()
        .any(|o| o.step == "preflight" && o.message.contains("not answering as homeport")));

    // second run upgrades in place and replaces secret and ingress
    assert_eq!(second.releases[0].revision, 2);
    let counts = h.cluster.operation_counts();
    assert_eq!(counts.secret_creates, 1);
    assert_eq!(counts.secret_replaces, 1);
    assert_eq!(counts.ingress_creates, 1);
    assert_eq!(counts.ingress_replaces, 1);
    assert_eq!(h.cluster.ingress_count(), 1);
    assert_eq!(browser.launched().len(), 2);
}

#[tokio::test]
async fn test_reinstall_over_served_port() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", REALM))
        .mount(&server)
        .await;
    let bound = server.address().port();

    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    h.engine = engine_bound_to(bound);
    let browser = RecordingBrowser::new();

    let outcome = h
        .orchestrator()
        .install(&options(bound), &browser)
        .await
        .unwrap();

    assert_eq!(outcome.port, bound);
    assert!(!outcome.cluster_created);
    assert!(h.reporter.with_status(StepStatus::Warn).is_empty());
    assert!(h
        .reporter
        .with_status(StepStatus::Ok)
        .iter()
        .any(|o| o.step == "preflight" && o.message.contains("existing homeport install")));
    assert_eq!(browser.launched(), vec![format!("http://localhost:{}", bound)]);
}

#[tokio::test]
async fn test_zero_poll_interval_rejected() {
    let mut h = Harness::new();
    h.settings.poll_interval = Duration::ZERO;
    h.gateway = MockClusterGateway::new().existing();

    let err = h
        .orchestrator()
        .install(&options(8000), &RecordingBrowser::new())
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Config { message } if message.contains("pollInterval")));

    let err = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Config { .. }));

    assert_eq!(h.engine.operation_counts().versions, 0);
    assert_eq!(h.gateway.deletes(), 0);
}

#[tokio::test]
async fn test_port_in_use_aborts_before_cluster() {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let h = Harness::new();

    let err = h
        .orchestrator()
        .install(&options(port), &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::PortUnavailable { port: p } if p == port));
    assert!(h.gateway.creates().is_empty());
    let failures = h.reporter.with_status(StepStatus::Fail);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].step, "preflight");
}

#[tokio::test]
async fn test_ingress_port_conflict() {
    let server = ingress_server().await;
    let port = server.address().port();
    let mut h = Harness::new();
    h.charts = MockChartClient::new().wait_timeout("ingress-nginx");

    let err = h
        .orchestrator()
        .install(&options(port), &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::IngressPortConflict { port: p } if p == port));
    assert_eq!(h.charts.install_order(), vec!["homeport"]);
    assert!(h.cluster.secret("homeport", "homeport-basic-auth").is_none());
    assert_eq!(h.reporter.with_status(StepStatus::Fail)[0].step, "charts");
}

#[tokio::test]
async fn test_chart_failure_is_fatal() {
    let server = ingress_server().await;
    let mut h = Harness::new();
    h.charts = MockChartClient::new().failing_repo("homeport");

    let err = h
        .orchestrator()
        .install(&options(server.address().port()), &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ChartDeployFailed { chart, .. } if chart == "homeport"));
    assert!(h.charts.install_order().is_empty());
}

#[tokio::test]
async fn test_liveness_timeout_skips_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).insert_header("WWW-Authenticate", REALM))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut h = Harness::new();
    h.settings.liveness_timeout = Duration::from_millis(200);
    let browser = RecordingBrowser::new();

    let err = h
        .orchestrator()
        .install(&options(server.address().port()), &browser)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::LivenessTimeout { .. }));
    assert!(browser.launched().is_empty());
    // everything before liveness stays in place
    assert!(h.cluster.ingress("homeport", "homeport-ingress").is_some());
}

#[tokio::test]
async fn test_no_browser() {
    let server = ingress_server().await;
    let h = Harness::new();
    let browser = RecordingBrowser::new();
    let mut opts = options(server.address().port());
    opts.no_browser = true;

    let outcome = h.orchestrator().install(&opts, &browser).await.unwrap();

    assert!(matches!(outcome.launch, LaunchOutcome::Skipped { .. }));
    assert!(browser.launched().is_empty());
}

#[tokio::test]
async fn test_browser_failure_is_a_warning() {
    let server = ingress_server().await;
    let h = Harness::new();

    let outcome = h
        .orchestrator()
        .install(&options(server.address().port()), &RecordingBrowser::failing())
        .await
        .unwrap();

    assert!(matches!(outcome.launch, LaunchOutcome::Manual { .. }));
    assert_eq!(h.reporter.with_status(StepStatus::Warn)[0].step, "liveness");
}

#[tokio::test]
async fn test_invalid_host_rejected_up_front() {
    let h = Harness::new();
    let mut opts = options(8000);
    opts.hosts = vec!["not_a_host".to_string()];

    let err = h
        .orchestrator()
        .install(&opts, &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Config { .. }));
    assert_eq!(h.engine.operation_counts().versions, 0);
}

#[tokio::test]
async fn test_engine_unreachable() {
    let mut h = Harness::new();
    h.engine = MockEngineClient::unreachable();

    let err = h
        .orchestrator()
        .install(&options(8000), &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::EngineUnreachable { .. }));
    assert!(h.gateway.creates().is_empty());
}

#[tokio::test]
async fn test_cancelled_install() {
    let h = Harness::new();
    h.cancel.cancel();

    let err = h
        .orchestrator()
        .install(&options(8000), &RecordingBrowser::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Cancelled));
}

#[tokio::test]
async fn test_uninstall() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    h.charts = MockChartClient::new()
        .with_release("homeport", "homeport")
        .with_release("ingress-nginx", "ingress-nginx");
    h.cluster = MockClusterApi::new()
        .with_namespace("homeport")
        .with_deletion_checks(2);
    std::fs::create_dir_all(&h.data_dir).unwrap();
    std::fs::write(h.data_dir.join("db"), b"data").unwrap();

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.state, UninstallState::Done);
    assert!(outcome.cluster_existed);
    assert!(outcome.data_removed);
    assert!(!h.data_dir.exists());
    assert!(!h.charts.has_release("homeport", "homeport"));
    assert!(!h.charts.has_release("ingress-nginx", "ingress-nginx"));
    assert!(!h.cluster.has_namespace("homeport"));
    assert_eq!(h.gateway.deletes(), 1);
    assert!(h.reporter.with_status(StepStatus::Warn).is_empty());

    let steps: Vec<String> = outcome.steps.iter().map(|o| o.step.clone()).collect();
    assert!(steps.contains(&"cluster delete".to_string()));
    assert_eq!(steps.last().map(String::as_str), Some("data"));
}

#[tokio::test]
async fn test_uninstall_without_cluster_api_skips_releases() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    h.charts = MockChartClient::new().with_release("homeport", "homeport");
    h.cluster_api_down = true;

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap();

    let warnings = h.reporter.with_status(StepStatus::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].step, "releases");
    assert_eq!(h.charts.operation_counts().release_lookups, 0);
    assert_eq!(h.gateway.deletes(), 1);
    assert_eq!(outcome.state, UninstallState::Done);
}

#[tokio::test]
async fn test_uninstall_data_removal_failure_is_a_warning() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    // a file where the directory should be
    std::fs::write(&h.data_dir, b"not a directory").unwrap();

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap();

    assert!(!outcome.data_removed);
    let warnings = h.reporter.with_status(StepStatus::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].step, "data");
    assert_eq!(h.gateway.deletes(), 1);
}

#[tokio::test]
async fn test_uninstall_persisted_keeps_data() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    std::fs::create_dir_all(&h.data_dir).unwrap();

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions { persisted: true })
        .await
        .unwrap();

    assert!(!outcome.data_removed);
    assert!(h.data_dir.exists());
    assert_eq!(h.gateway.deletes(), 1);
}

#[tokio::test]
async fn test_uninstall_without_cluster_is_noop() {
    let h = Harness::new();

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap();

    assert!(!outcome.cluster_existed);
    assert_eq!(h.gateway.deletes(), 0);
    assert_eq!(h.charts.operation_counts().release_lookups, 0);
}

#[tokio::test]
async fn test_uninstall_namespace_timeout_is_a_warning() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing();
    h.cluster = MockClusterApi::new()
        .with_namespace("homeport")
        .with_stuck_namespaces();
    h.settings.namespace_delete_timeout = Duration::from_millis(100);

    let outcome = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap();

    let warnings = h.reporter.with_status(StepStatus::Warn);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].step, "delete namespace");
    assert_eq!(h.gateway.deletes(), 1);
    assert!(outcome.cluster_existed);
}

#[tokio::test]
async fn test_uninstall_cluster_delete_failure_is_fatal() {
    let mut h = Harness::new();
    h.gateway = MockClusterGateway::new().existing().failing_delete();

    let err = h
        .orchestrator()
        .uninstall(&UninstallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ClusterOperationFailed { .. }));
}
