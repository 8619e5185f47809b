//! Mock cluster API for testing
//!
//! Stores secrets and ingresses in memory and simulates namespace
//! termination taking a configurable number of existence checks.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::api::ClusterApi;
use crate::error::{KubeError, Result};

type Key = (String, String);

/// In-memory cluster API for testing
#[derive(Clone)]
pub struct MockClusterApi {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

struct MockState {
    secrets: BTreeMap<Key, Secret>,
    ingresses: BTreeMap<Key, Ingress>,
    namespaces: HashMap<String, NamespaceState>,
    services: HashMap<Key, Vec<String>>,
    /// Existence checks a terminating namespace survives
    deletion_checks: usize,
    /// Existence checks that fail before answering
    failing_checks: usize,
    unreachable: bool,
    /// Namespace deletes never return
    hanging_deletes: bool,
    resource_version: u64,
}

#[derive(Debug, Clone, Copy)]
enum NamespaceState {
    Active,
    Terminating { remaining: usize },
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub secret_creates: usize,
    pub secret_replaces: usize,
    pub ingress_creates: usize,
    pub ingress_replaces: usize,
    pub namespace_checks: usize,
    pub namespace_deletes: usize,
    pub service_lookups: usize,
}

impl MockClusterApi {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                secrets: BTreeMap::new(),
                ingresses: BTreeMap::new(),
                namespaces: HashMap::new(),
                services: HashMap::new(),
                deletion_checks: 0,
                failing_checks: 0,
                unreachable: false,
                hanging_deletes: false,
                resource_version: 0,
            })),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// Add an active namespace
    pub fn with_namespace(self, name: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .namespaces
            .insert(name.to_string(), NamespaceState::Active);
        self
    }

    /// Deleted namespaces stay visible for `checks` existence checks
    pub fn with_deletion_checks(self, checks: usize) -> Self {
        self.state.write().unwrap().deletion_checks = checks;
        self
    }

    /// Deleted namespaces never go away
    pub fn with_stuck_namespaces(self) -> Self {
        self.with_deletion_checks(usize::MAX)
    }

    /// The next `count` existence checks fail
    pub fn with_failing_checks(self, count: usize) -> Self {
        self.state.write().unwrap().failing_checks = count;
        self
    }

    /// Give a service external addresses
    pub fn with_service_addresses(self, namespace: &str, name: &str, addresses: &[&str]) -> Self {
        self.state.write().unwrap().services.insert(
            (namespace.to_string(), name.to_string()),
            addresses.iter().map(|a| a.to_string()).collect(),
        );
        self
    }

    /// Namespace delete calls block forever
    pub fn with_hanging_deletes(self) -> Self {
        self.state.write().unwrap().hanging_deletes = true;
        self
    }

    /// Every call to `server_version` fails
    pub fn unreachable(self) -> Self {
        self.state.write().unwrap().unreachable = true;
        self
    }

    /// Stored secret, if any
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .read()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Stored ingress, if any
    pub fn ingress(&self, namespace: &str, name: &str) -> Option<Ingress> {
        self.state
            .read()
            .unwrap()
            .ingresses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of ingresses across all namespaces
    pub fn ingress_count(&self) -> usize {
        self.state.read().unwrap().ingresses.len()
    }

    /// Whether a namespace is present (active or terminating)
    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.read().unwrap().namespaces.contains_key(name)
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

impl Default for MockClusterApi {
    fn default() -> Self {
        Self::new()
    }
}

fn key(namespace: &str, meta: &ObjectMeta, kind: &str) -> Result<Key> {
    let name = meta.name.clone().ok_or_else(|| KubeError::MissingName {
        kind: kind.to_string(),
    })?;
    Ok((namespace.to_string(), name))
}

impl MockState {
    fn stamp(&mut self, namespace: &str, meta: &mut ObjectMeta) {
        self.resource_version += 1;
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(self.resource_version.to_string());
        self.namespaces
            .entry(namespace.to_string())
            .or_insert(NamespaceState::Active);
    }
}

#[async_trait]
impl ClusterApi for MockClusterApi {
    async fn server_version(&self) -> Result<String> {
        if self.state.read().unwrap().unreachable {
            return Err(KubeError::Kubeconfig {
                path: "mock".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok("v1.31.0".to_string())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        self.operations.write().unwrap().secret_creates += 1;

        let key = key(namespace, &secret.metadata, "Secret")?;
        let mut state = self.state.write().unwrap();
        if state.secrets.contains_key(&key) {
            return Err(KubeError::AlreadyExists {
                kind: "Secret".to_string(),
                name: key.1,
                namespace: key.0,
            });
        }

        let mut stored = secret.clone();
        state.stamp(namespace, &mut stored.metadata);
        state.secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        self.operations.write().unwrap().secret_replaces += 1;

        let key = key(namespace, &secret.metadata, "Secret")?;
        let mut state = self.state.write().unwrap();
        if !state.secrets.contains_key(&key) {
            return Err(KubeError::NotFound {
                kind: "Secret".to_string(),
                name: key.1,
                namespace: key.0,
            });
        }

        let mut stored = secret.clone();
        state.stamp(namespace, &mut stored.metadata);
        state.secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        Ok(self.ingress(namespace, name))
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress> {
        self.operations.write().unwrap().ingress_creates += 1;

        let key = key(namespace, &ingress.metadata, "Ingress")?;
        let mut state = self.state.write().unwrap();
        if state.ingresses.contains_key(&key) {
            return Err(KubeError::AlreadyExists {
                kind: "Ingress".to_string(),
                name: key.1,
                namespace: key.0,
            });
        }

        let mut stored = ingress.clone();
        state.stamp(namespace, &mut stored.metadata);
        state.ingresses.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress> {
        self.operations.write().unwrap().ingress_replaces += 1;

        let key = key(namespace, &ingress.metadata, "Ingress")?;
        let mut state = self.state.write().unwrap();
        if !state.ingresses.contains_key(&key) {
            return Err(KubeError::NotFound {
                kind: "Ingress".to_string(),
                name: key.1,
                namespace: key.0,
            });
        }

        let mut stored = ingress.clone();
        state.stamp(namespace, &mut stored.metadata);
        state.ingresses.insert(key, stored.clone());
        Ok(stored)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        self.operations.write().unwrap().namespace_checks += 1;

        let mut state = self.state.write().unwrap();
        if state.failing_checks > 0 {
            state.failing_checks -= 1;
            return Err(KubeError::Kubeconfig {
                path: "mock".to_string(),
                message: "transient failure".to_string(),
            });
        }

        match state.namespaces.get(name).copied() {
            None => Ok(false),
            Some(NamespaceState::Active) => Ok(true),
            Some(NamespaceState::Terminating { remaining: 0 }) => {
                state.namespaces.remove(name);
                state.secrets.retain(|(ns, _), _| ns != name);
                state.ingresses.retain(|(ns, _), _| ns != name);
                Ok(false)
            }
            Some(NamespaceState::Terminating { remaining }) => {
                let remaining = if remaining == usize::MAX {
                    remaining
                } else {
                    remaining - 1
                };
                state
                    .namespaces
                    .insert(name.to_string(), NamespaceState::Terminating { remaining });
                Ok(true)
            }
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        self.operations.write().unwrap().namespace_deletes += 1;

        let hanging = self.state.read().unwrap().hanging_deletes;
        if hanging {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.write().unwrap();
        let remaining = state.deletion_checks;
        if let Some(ns) = state.namespaces.get_mut(name) {
            if matches!(ns, NamespaceState::Active) {
                *ns = NamespaceState::Terminating { remaining };
            }
        }
        Ok(())
    }

    async fn service_external_addresses(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>> {
        self.operations.write().unwrap().service_lookups += 1;

        Ok(self
            .state
            .read()
            .unwrap()
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
