//! Chart client backed by the `helm` binary
//!
//! Every invocation carries `--kubeconfig` / `--kube-context` so the user's
//! default context is never touched. Failures are classified from stderr.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::client::{ChartClient, ChartMetadata, InstallSpec, ReleaseInfo, RepoEntry};
use crate::error::{HelmError, Result};

const HELM_BINARY: &str = "helm";

/// Stderr fragments helm prints when `--wait` gives up
const WAIT_TIMEOUT_MARKERS: &[&str] = &[
    "client rate limiter wait returned an error",
    "context deadline exceeded",
    "timed out waiting for the condition",
];

/// `helm` CLI client
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl HelmCli {
    /// Use `helm` from PATH
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(HELM_BINARY),
            kubeconfig: None,
            context: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Target a specific kubeconfig and context
    pub fn with_kubeconfig(mut self, kubeconfig: &Path, context: impl Into<String>) -> Self {
        self.kubeconfig = Some(kubeconfig.to_path_buf());
        self.context = Some(context.into());
        self
    }

    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        args
    }

    async fn run(&self, args: Vec<String>) -> std::result::Result<Vec<u8>, Failure> {
        let mut full = args;
        full.extend(self.global_args());

        tracing::debug!(args = ?full, "running helm");
        let output = Command::new(&self.binary)
            .args(&full)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Failure::Error(HelmError::NotInstalled {
                        binary: self.binary.display().to_string(),
                    })
                } else {
                    Failure::Error(e.into())
                }
            })?;

        if !output.status.success() {
            return Err(Failure::Stderr {
                command: format!("helm {}", full.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure before classification
enum Failure {
    Stderr { command: String, stderr: String },
    Error(HelmError),
}

impl Failure {
    fn into_error(self) -> HelmError {
        match self {
            Failure::Stderr { command, stderr } => HelmError::CommandFailed { command, stderr },
            Failure::Error(e) => e,
        }
    }
}

fn repo_add_args(repo: &RepoEntry) -> Vec<String> {
    vec![
        "repo".to_string(),
        "add".to_string(),
        repo.name.clone(),
        repo.url.clone(),
        "--force-update".to_string(),
    ]
}

fn show_chart_args(chart_ref: &str, version: Option<&str>) -> Vec<String> {
    let mut args = vec!["show".to_string(), "chart".to_string(), chart_ref.to_string()];
    if let Some(version) = version {
        args.push("--version".to_string());
        args.push(version.to_string());
    }
    args
}

fn install_args(spec: &InstallSpec) -> Vec<String> {
    let mut args = vec![
        "upgrade".to_string(),
        "--install".to_string(),
        spec.release.clone(),
        spec.chart_ref.clone(),
        "--namespace".to_string(),
        spec.namespace.clone(),
        "--create-namespace".to_string(),
        "--wait".to_string(),
        "--timeout".to_string(),
        format!("{}s", spec.timeout.as_secs()),
        "--output".to_string(),
        "json".to_string(),
    ];
    if let Some(version) = &spec.version {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if let Some(file) = &spec.values_file {
        args.push("--values".to_string());
        args.push(file.display().to_string());
    }
    for value in &spec.values {
        args.push("--set".to_string());
        args.push(value.clone());
    }
    args
}

fn is_release_not_found(stderr: &str) -> bool {
    stderr.to_lowercase().contains("release: not found")
}

fn is_wait_timeout(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    WAIT_TIMEOUT_MARKERS.iter().any(|m| lower.contains(m))
}

#[derive(Deserialize)]
struct HelmRelease {
    name: String,
    namespace: String,
    version: u32,
    #[serde(default)]
    info: Option<HelmReleaseInfo>,
    #[serde(default)]
    chart: Option<HelmChart>,
}

#[derive(Deserialize)]
struct HelmReleaseInfo {
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct HelmChart {
    metadata: ChartMetadata,
}

fn parse_release(command: &str, out: &[u8]) -> Result<ReleaseInfo> {
    let release: HelmRelease = serde_json::from_slice(out).map_err(|e| HelmError::Parse {
        command: command.to_string(),
        message: e.to_string(),
    })?;
    Ok(ReleaseInfo {
        name: release.name,
        namespace: release.namespace,
        revision: release.version,
        chart_version: release
            .chart
            .map(|c| c.metadata.version)
            .unwrap_or_default(),
        status: release.info.map(|i| i.status).unwrap_or_default(),
    })
}

fn parse_chart(out: &[u8]) -> Result<ChartMetadata> {
    serde_yaml::from_slice(out).map_err(|e| HelmError::Parse {
        command: "helm show chart".to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ChartClient for HelmCli {
    async fn add_or_update_repo(&self, repo: &RepoEntry) -> Result<()> {
        let repo_failed = |f: Failure| match f {
            Failure::Stderr { stderr, .. } => HelmError::RepoFailed {
                name: repo.name.clone(),
                url: repo.url.clone(),
                message: stderr,
            },
            Failure::Error(e) => e,
        };

        self.run(repo_add_args(repo)).await.map_err(repo_failed)?;
        self.run(vec![
            "repo".to_string(),
            "update".to_string(),
            repo.name.clone(),
        ])
        .await
        .map_err(repo_failed)?;

        tracing::debug!(repo = %repo.name, url = %repo.url, "repository ready");
        Ok(())
    }

    async fn get_chart(&self, chart_ref: &str, version: Option<&str>) -> Result<ChartMetadata> {
        let out = self
            .run(show_chart_args(chart_ref, version))
            .await
            .map_err(|f| match f {
                Failure::Stderr { stderr, .. } => HelmError::ChartFetchFailed {
                    chart: chart_ref.to_string(),
                    message: stderr,
                },
                Failure::Error(e) => e,
            })?;
        parse_chart(&out)
    }

    async fn install_or_upgrade(&self, spec: &InstallSpec) -> Result<ReleaseInfo> {
        let out = self.run(install_args(spec)).await.map_err(|f| match f {
            Failure::Stderr { stderr, .. } if is_wait_timeout(&stderr) => HelmError::WaitTimeout {
                release: spec.release.clone(),
                namespace: spec.namespace.clone(),
                message: stderr,
            },
            other => other.into_error(),
        })?;
        parse_release("helm upgrade --install", &out)
    }

    async fn get_release(&self, release: &str, namespace: &str) -> Result<ReleaseInfo> {
        let args = vec![
            "status".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let out = self.run(args).await.map_err(|f| match f {
            Failure::Stderr { stderr, .. } if is_release_not_found(&stderr) => {
                HelmError::ReleaseNotFound {
                    release: release.to_string(),
                    namespace: namespace.to_string(),
                }
            }
            other => other.into_error(),
        })?;
        parse_release("helm status", &out)
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        let args = vec![
            "uninstall".to_string(),
            release.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--wait".to_string(),
        ];
        self.run(args).await.map_err(|f| match f {
            Failure::Stderr { stderr, .. } if is_release_not_found(&stderr) => {
                HelmError::ReleaseNotFound {
                    release: release.to_string(),
                    namespace: namespace.to_string(),
                }
            }
            other => other.into_error(),
        })?;
        Ok(())
    }
}
