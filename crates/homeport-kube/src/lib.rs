//! homeport Kube - Kubernetes integration for the install engine
//!
//! This crate provides:
//! - **Cluster API**: the narrow set of calls the engine makes, behind [`ClusterApi`]
//! - **Credentials**: bcrypt basic-auth secret, replaced on every install
//! - **Ingress**: host routing for the web front end, created or replaced
//! - **Namespace teardown**: delete and wait until the namespace is gone
//! - **Mock**: in-memory [`MockClusterApi`] for tests

pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod ingress;
pub mod mock;
pub mod namespace;

pub use api::{ClusterApi, KubeClusterApi};
pub use client::{create_client, create_client_with_timeout};
pub use credentials::{AUTH_KEY, CredentialManager};
pub use error::{KubeError, Result};
pub use ingress::{IngressAction, IngressManager};
pub use mock::{MockClusterApi, OperationCounts};
pub use namespace::{MIN_POLL_INTERVAL, NamespaceWait, delete_namespace_and_wait};
