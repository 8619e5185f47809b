//! Cluster backend selection

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Name of the kind-backed provider
pub const KIND: &str = "kind";

/// Name of the provider for clusters exposing a LoadBalancer
pub const EXTERNAL: &str = "external";

/// The cluster backend targeted by an install or uninstall
///
/// Selected once by the caller and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Display name
    pub name: String,

    /// Logical cluster name
    pub cluster_name: String,

    /// Kube context identifying the control plane
    pub context: String,

    /// Kubeconfig file used by every client
    pub kubeconfig: PathBuf,

    /// Value overrides applied to the ingress-controller chart
    pub ingress_values: Vec<String>,

    /// Whether the ingress port is fixed when the cluster is created
    pub pins_port: bool,
}

impl Provider {
    /// kind cluster with the ingress controller bound to a host port
    pub fn kind(cluster_name: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        let cluster_name = cluster_name.into();
        Self {
            name: KIND.to_string(),
            context: format!("kind-{}", cluster_name),
            cluster_name,
            kubeconfig: kubeconfig.into(),
            ingress_values: vec![
                "controller.hostPort.enabled=true".to_string(),
                "controller.service.type=NodePort".to_string(),
                "controller.nodeSelector.ingress-ready=true".to_string(),
            ],
            pins_port: true,
        }
    }

    /// Cluster whose ingress controller is reached through a LoadBalancer service
    pub fn external(
        cluster_name: impl Into<String>,
        context: impl Into<String>,
        kubeconfig: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: EXTERNAL.to_string(),
            cluster_name: cluster_name.into(),
            context: context.into(),
            kubeconfig: kubeconfig.into(),
            ingress_values: vec!["controller.service.type=LoadBalancer".to_string()],
            pins_port: false,
        }
    }

    /// Resolve a provider preset by name
    pub fn from_name(
        name: &str,
        cluster_name: &str,
        kubeconfig: impl Into<PathBuf>,
    ) -> Result<Self> {
        match name {
            KIND => Ok(Self::kind(cluster_name, kubeconfig)),
            EXTERNAL => Ok(Self::external(cluster_name, cluster_name, kubeconfig)),
            other => Err(CoreError::UnknownProvider {
                name: other.to_string(),
                expected: [KIND, EXTERNAL].join(", "),
            }),
        }
    }

    /// Name of the container hosting the control plane
    pub fn control_plane_container(&self) -> String {
        format!("{}-control-plane", self.cluster_name)
    }
}
