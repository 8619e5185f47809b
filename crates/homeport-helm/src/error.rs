//! Error types for homeport-helm

use thiserror::Error;

/// Result type for homeport-helm operations
pub type Result<T> = std::result::Result<T, HelmError>;

/// Errors that can occur during chart operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelmError {
    /// Package manager binary not found
    #[error("'{binary}' not found on PATH")]
    NotInstalled { binary: String },

    /// Repository could not be added or refreshed
    #[error("failed to add or update repository '{name}' ({url}): {message}")]
    RepoFailed {
        name: String,
        url: String,
        message: String,
    },

    /// Chart could not be fetched
    #[error("failed to fetch chart '{chart}': {message}")]
    ChartFetchFailed { chart: String, message: String },

    /// Release lookup found nothing
    #[error("release '{release}' not found in namespace '{namespace}'")]
    ReleaseNotFound { release: String, namespace: String },

    /// Install gave up waiting for resources to become ready
    #[error("timed out waiting for release '{release}' in namespace '{namespace}': {message}")]
    WaitTimeout {
        release: String,
        namespace: String,
        message: String,
    },

    /// Wait timeout on the ingress controller with no external address
    #[error(
        "release '{release}' never became ready and service '{service}' has no external address"
    )]
    IngressPortConflict { release: String, service: String },

    /// Any other failed invocation
    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Output could not be parsed
    #[error("failed to parse output of '{command}': {message}")]
    Parse { command: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HelmError {
    /// Whether the release does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, HelmError::ReleaseNotFound { .. })
    }

    /// Whether this is a wait or rate-limiter timeout
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, HelmError::WaitTimeout { .. })
    }
}
