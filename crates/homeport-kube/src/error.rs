//! Error types for homeport-kube

use thiserror::Error;

/// Result type for homeport-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during Kubernetes operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be loaded
    #[error("failed to load kubeconfig '{path}': {message}")]
    Kubeconfig { path: String, message: String },

    /// Resource does not exist
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Resource already exists
    #[error("{kind} '{name}' already exists in namespace '{namespace}'")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Object submitted without `metadata.name`
    #[error("{kind} has no metadata.name")]
    MissingName { kind: String },

    /// Credentials rejected before hashing
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Password hashing failed
    #[error("failed to hash password: {0}")]
    Hash(String),

    /// Namespace still present when the deadline fired
    #[error("namespace '{namespace}' was not deleted within {timeout:?}")]
    NamespaceDeleteTimeout {
        namespace: String,
        timeout: std::time::Duration,
    },

    /// Operation cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::NotFound { .. } => true,
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }
}
