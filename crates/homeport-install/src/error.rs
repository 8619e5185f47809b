//! Install and uninstall errors
//!
//! Every variant names the operation and target it failed on and carries a
//! remediation hint for the terminal.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::cluster::ClusterError;

/// Result type for install operations
pub type Result<T> = std::result::Result<T, InstallError>;

#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum InstallError {
    #[error("container engine is unreachable")]
    #[diagnostic(
        code(homeport::engine_unreachable),
        help("start Docker (or Docker Desktop) and make sure `docker version` works")
    )]
    EngineUnreachable {
        #[source]
        source: homeport_docker::DockerError,
    },

    #[error("port {port} is already in use")]
    #[diagnostic(
        code(homeport::port_unavailable),
        help("free the port or choose another one with --port")
    )]
    PortUnavailable { port: u16 },

    #[error("failed to probe port {port}")]
    #[diagnostic(code(homeport::port_probe))]
    PortProbe {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("ingress controller could not bind port {port}")]
    #[diagnostic(
        code(homeport::ingress_port_conflict),
        help(
            "another process is probably listening on port {port}; free it, or uninstall and reinstall with --port"
        )
    )]
    IngressPortConflict { port: u16 },

    #[error("container '{name}' is not running (status: {status})")]
    #[diagnostic(
        code(homeport::container_not_running),
        help("start the container, or uninstall and install again")
    )]
    ContainerNotRunning { name: String, status: String },

    #[error("failed to inspect container '{name}'")]
    #[diagnostic(code(homeport::inspect_failed), help("check that Docker is running"))]
    InspectFailed {
        name: String,
        #[source]
        source: homeport_docker::DockerError,
    },

    #[error("container '{name}' publishes an invalid host port '{value}'")]
    #[diagnostic(code(homeport::invalid_port))]
    InvalidPort { name: String, value: String },

    #[error("container '{name}' does not publish a port on all interfaces")]
    #[diagnostic(
        code(homeport::port_not_found),
        help("the cluster was not created by homeport; uninstall it and install again")
    )]
    PortNotFound { name: String },

    #[error("cluster '{cluster}': {operation} failed")]
    #[diagnostic(code(homeport::cluster_operation))]
    ClusterOperationFailed {
        cluster: String,
        operation: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to deploy chart '{chart}'")]
    #[diagnostic(
        code(homeport::chart_deploy),
        help("run with --debug to see the package manager output")
    )]
    ChartDeployFailed {
        chart: String,
        #[source]
        source: homeport_helm::HelmError,
    },

    #[error("cluster API call failed: {operation}")]
    #[diagnostic(
        code(homeport::cluster_api),
        help("check that the cluster is running and its kubeconfig is readable")
    )]
    ClusterApi {
        operation: String,
        #[source]
        source: homeport_kube::KubeError,
    },

    #[error("namespace '{namespace}' was not deleted within {timeout:?}")]
    #[diagnostic(
        code(homeport::namespace_delete_timeout),
        help("the namespace may still be terminating; check it with kubectl")
    )]
    NamespaceDeleteTimeout { namespace: String, timeout: Duration },

    #[error("{url} did not become ready within {timeout:?}")]
    #[diagnostic(
        code(homeport::liveness_timeout),
        help("the application may still be starting; try opening {url} in a minute")
    )]
    LivenessTimeout { url: String, timeout: Duration },

    #[error("failed to build readiness request for {url}: {message}")]
    #[diagnostic(code(homeport::liveness_request))]
    LivenessRequest { url: String, message: String },

    #[error("invalid settings: {message}")]
    #[diagnostic(code(homeport::config))]
    Config { message: String },

    #[error("IO error on '{path}'")]
    #[diagnostic(code(homeport::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    #[diagnostic(code(homeport::cancelled))]
    Cancelled,
}

impl InstallError {
    pub(crate) fn cluster_api(operation: impl Into<String>, source: homeport_kube::KubeError) -> Self {
        match source {
            homeport_kube::KubeError::Cancelled => Self::Cancelled,
            source => Self::ClusterApi {
                operation: operation.into(),
                source,
            },
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<homeport_core::CoreError> for InstallError {
    fn from(e: homeport_core::CoreError) -> Self {
        Self::Config {
            message: e.to_string(),
        }
    }
}
