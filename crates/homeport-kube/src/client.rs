//! Kubernetes client construction

use std::path::Path;
use std::time::Duration;

use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};

use crate::error::{KubeError, Result};

/// Connection timeout for the local API server
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read timeout for API calls
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a client for `context` in the kubeconfig at `path`
pub async fn create_client(path: &Path, context: &str) -> Result<Client> {
    create_client_with_timeout(path, context, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a client with custom timeouts
pub async fn create_client_with_timeout(
    path: &Path,
    context: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client> {
    let kubeconfig_error = |message: String| KubeError::Kubeconfig {
        path: path.display().to_string(),
        message,
    };

    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| kubeconfig_error(e.to_string()))?;

    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };

    let mut config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| kubeconfig_error(e.to_string()))?;
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    tracing::debug!(path = %path.display(), context, "creating kubernetes client");
    Ok(Client::try_from(config)?)
}
