//! Local cluster lifecycle
//!
//! [`KindGateway`] drives the `kind` binary: the cluster config is generated
//! and piped on stdin, and the kubeconfig is exported to homeport's own file
//! instead of the user's default one.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Node path backing the local-path provisioner
pub const STORAGE_MOUNT_PATH: &str = "/var/local-path-provisioner";

const KIND_BINARY: &str = "kind";

/// Errors from the cluster provisioner
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClusterError {
    #[error("'{binary}' not found on PATH")]
    NotInstalled { binary: String },

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("failed to render cluster config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A host directory mounted into the cluster node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl Mount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }
}

/// Cluster provisioner capabilities
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn exists(&self) -> Result<bool, ClusterError>;

    /// Create the cluster with ingress on `port` and `mounts` on the node
    async fn create(&self, port: u16, mounts: &[Mount]) -> Result<(), ClusterError>;

    async fn delete(&self) -> Result<(), ClusterError>;
}

/// `kind` CLI gateway
#[derive(Debug, Clone)]
pub struct KindGateway {
    binary: PathBuf,
    cluster_name: String,
    kubeconfig: PathBuf,
}

impl KindGateway {
    pub fn new(cluster_name: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from(KIND_BINARY),
            cluster_name: cluster_name.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<Vec<u8>, ClusterError> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClusterError::NotInstalled {
                        binary: self.binary.display().to_string(),
                    }
                } else {
                    ClusterError::Io(e)
                }
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ClusterError::CommandFailed {
                command: format!("kind {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ClusterGateway for KindGateway {
    async fn exists(&self) -> Result<bool, ClusterError> {
        let out = self.run(&["get", "clusters"], None).await?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .any(|line| line.trim() == self.cluster_name))
    }

    async fn create(&self, port: u16, mounts: &[Mount]) -> Result<(), ClusterError> {
        let config = kind_config(port, mounts)?;
        tracing::info!(cluster = %self.cluster_name, port, "creating kind cluster");
        tracing::debug!(%config, "kind cluster config");

        self.run(
            &["create", "cluster", "--name", &self.cluster_name, "--config", "-"],
            Some(&config),
        )
        .await?;

        if let Some(parent) = self.kubeconfig.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let kubeconfig = path_arg(&self.kubeconfig)?;
        self.run(
            &[
                "export",
                "kubeconfig",
                "--name",
                &self.cluster_name,
                "--kubeconfig",
                &kubeconfig,
            ],
            None,
        )
        .await?;

        Ok(())
    }

    async fn delete(&self) -> Result<(), ClusterError> {
        let kubeconfig = path_arg(&self.kubeconfig)?;
        tracing::info!(cluster = %self.cluster_name, "deleting kind cluster");
        self.run(
            &[
                "delete",
                "cluster",
                "--name",
                &self.cluster_name,
                "--kubeconfig",
                &kubeconfig,
            ],
            None,
        )
        .await?;
        Ok(())
    }
}

fn path_arg(path: &Path) -> Result<String, ClusterError> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        ClusterError::Unsupported(format!("path is not valid UTF-8: {}", path.display()))
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindConfig {
    kind: &'static str,
    api_version: &'static str,
    nodes: Vec<KindNode>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindNode {
    role: &'static str,
    labels: std::collections::BTreeMap<&'static str, &'static str>,
    extra_port_mappings: Vec<KindPortMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extra_mounts: Vec<KindMount>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindPortMapping {
    container_port: u16,
    host_port: u16,
    listen_address: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KindMount {
    host_path: String,
    container_path: String,
}

/// Single control-plane node labelled for ingress, port 80 published on `port`
pub fn kind_config(port: u16, mounts: &[Mount]) -> Result<String, ClusterError> {
    let extra_mounts = mounts
        .iter()
        .map(|m| {
            Ok(KindMount {
                host_path: path_arg(&m.host_path)?,
                container_path: m.container_path.clone(),
            })
        })
        .collect::<Result<Vec<_>, ClusterError>>()?;

    let config = KindConfig {
        kind: "Cluster",
        api_version: "kind.x-k8s.io/v1alpha4",
        nodes: vec![KindNode {
            role: "control-plane",
            labels: [("ingress-ready", "true")].into_iter().collect(),
            extra_port_mappings: vec![KindPortMapping {
                container_port: 80,
                host_port: port,
                listen_address: "0.0.0.0",
            }],
            extra_mounts,
        }],
    };

    Ok(serde_yaml::to_string(&config)?)
}

/// Gateway for a cluster homeport does not manage
///
/// The cluster always exists; creating it is an error and deleting it only
/// removes what homeport deployed.
#[derive(Debug, Clone, Default)]
pub struct ExternalGateway;

#[async_trait]
impl ClusterGateway for ExternalGateway {
    async fn exists(&self) -> Result<bool, ClusterError> {
        Ok(true)
    }

    async fn create(&self, _port: u16, _mounts: &[Mount]) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported(
            "external clusters must be created outside homeport".to_string(),
        ))
    }

    async fn delete(&self) -> Result<(), ClusterError> {
        tracing::debug!("external cluster left in place");
        Ok(())
    }
}

/// In-memory gateway for testing
#[derive(Clone, Default)]
pub struct MockClusterGateway {
    state: Arc<RwLock<MockGatewayState>>,
}

#[derive(Default)]
struct MockGatewayState {
    exists: bool,
    fail_create: bool,
    fail_delete: bool,
    created_with: Vec<(u16, Vec<Mount>)>,
    deletes: usize,
}

impl MockClusterGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the cluster present
    pub fn existing(self) -> Self {
        self.state.write().unwrap().exists = true;
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.write().unwrap().fail_create = true;
        self
    }

    pub fn failing_delete(self) -> Self {
        self.state.write().unwrap().fail_delete = true;
        self
    }

    /// `(port, mounts)` of every create call
    pub fn creates(&self) -> Vec<(u16, Vec<Mount>)> {
        self.state.read().unwrap().created_with.clone()
    }

    pub fn deletes(&self) -> usize {
        self.state.read().unwrap().deletes
    }

    pub fn is_present(&self) -> bool {
        self.state.read().unwrap().exists
    }
}

#[async_trait]
impl ClusterGateway for MockClusterGateway {
    async fn exists(&self) -> Result<bool, ClusterError> {
        Ok(self.state.read().unwrap().exists)
    }

    async fn create(&self, port: u16, mounts: &[Mount]) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap();
        state.created_with.push((port, mounts.to_vec()));
        if state.fail_create {
            return Err(ClusterError::CommandFailed {
                command: "kind create cluster".to_string(),
                stderr: "failed to create cluster".to_string(),
            });
        }
        state.exists = true;
        Ok(())
    }

    async fn delete(&self) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap();
        state.deletes += 1;
        if state.fail_delete {
            return Err(ClusterError::CommandFailed {
                command: "kind delete cluster".to_string(),
                stderr: "failed to delete cluster".to_string(),
            });
        }
        state.exists = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_config() {
        let config = kind_config(8000, &[Mount::new("/home/u/.homeport/data", STORAGE_MOUNT_PATH)]).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&config).unwrap();

        assert_eq!(value["kind"], "Cluster");
        assert_eq!(value["apiVersion"], "kind.x-k8s.io/v1alpha4");

        let node = &value["nodes"][0];
        assert_eq!(node["role"], "control-plane");
        assert_eq!(node["labels"]["ingress-ready"], "true");
        assert_eq!(node["extraPortMappings"][0]["containerPort"], 80);
        assert_eq!(node["extraPortMappings"][0]["hostPort"], 8000);
        assert_eq!(node["extraPortMappings"][0]["listenAddress"], "0.0.0.0");
        assert_eq!(node["extraMounts"][0]["hostPath"], "/home/u/.homeport/data");
        assert_eq!(node["extraMounts"][0]["containerPath"], STORAGE_MOUNT_PATH);
    }

    #[test]
    fn test_kind_config_without_mounts() {
        let config = kind_config(9000, &[]).unwrap();
        assert!(!config.contains("extraMounts"));
        assert!(config.contains("hostPort: 9000"));
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let gateway = MockClusterGateway::new();
        assert!(!gateway.exists().await.unwrap());

        gateway.create(8000, &[]).await.unwrap();
        assert!(gateway.exists().await.unwrap());
        assert_eq!(gateway.creates()[0].0, 8000);

        gateway.delete().await.unwrap();
        assert!(!gateway.is_present());
    }

    #[tokio::test]
    async fn test_external_gateway() {
        let gateway = ExternalGateway;
        assert!(gateway.exists().await.unwrap());
        assert!(gateway.create(80, &[]).await.is_err());
        gateway.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_kind_binary() {
        let gateway = KindGateway::new("homeport", "/tmp/kc").with_binary("definitely-not-kind");
        assert!(matches!(
            gateway.exists().await,
            Err(ClusterError::NotInstalled { .. })
        ));
    }
}
