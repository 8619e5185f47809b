//! Cluster API capability
//!
//! The install engine only needs a handful of calls against the cluster. They
//! sit behind [`ClusterApi`] so orchestration can run against
//! [`MockClusterApi`](crate::MockClusterApi) in tests.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Client;
use kube::api::{Api, DeleteParams, PostParams};

use crate::error::{KubeError, Result};

/// Calls the install engine makes against the cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// API server version (`v1.31.0`); used as a reachability check
    async fn server_version(&self) -> Result<String>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;

    /// Replace an existing secret wholesale
    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>>;

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress>;

    /// Replace an existing ingress wholesale
    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress>;

    /// Whether the namespace exists, including while it is terminating
    async fn namespace_exists(&self, name: &str) -> Result<bool>;

    /// Request namespace deletion; a missing namespace is not an error
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    /// External addresses (IPs or hostnames) assigned to a service
    ///
    /// Empty when the service does not exist or has no address yet.
    async fn service_external_addresses(&self, namespace: &str, name: &str)
    -> Result<Vec<String>>;
}

/// [`ClusterApi`] backed by a kube client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn ingresses(&self, namespace: &str) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

fn object_name(name: Option<&String>, kind: &str) -> Result<String> {
    name.cloned().ok_or_else(|| KubeError::MissingName {
        kind: kind.to_string(),
    })
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn server_version(&self) -> Result<String> {
        let info = self.client.apiserver_version().await?;
        Ok(info.git_version)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        let name = object_name(secret.metadata.name.as_ref(), "Secret")?;
        Ok(self
            .secrets(namespace)
            .replace(&name, &PostParams::default(), secret)
            .await?)
    }

    async fn get_ingress(&self, namespace: &str, name: &str) -> Result<Option<Ingress>> {
        Ok(self.ingresses(namespace).get_opt(name).await?)
    }

    async fn create_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress> {
        Ok(self
            .ingresses(namespace)
            .create(&PostParams::default(), ingress)
            .await?)
    }

    async fn replace_ingress(&self, namespace: &str, ingress: &Ingress) -> Result<Ingress> {
        let name = object_name(ingress.metadata.name.as_ref(), "Ingress")?;
        Ok(self
            .ingresses(namespace)
            .replace(&name, &PostParams::default(), ingress)
            .await?)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.namespaces().get_opt(name).await?.is_some())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        match self.namespaces().delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                tracing::debug!(namespace = name, "namespace already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn service_external_addresses(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .get_opt(name)
            .await?
            .map(|svc| external_addresses(&svc))
            .unwrap_or_default())
    }
}

/// Load-balancer ingress points plus any explicit external IPs
pub(crate) fn external_addresses(service: &Service) -> Vec<String> {
    let mut addresses: Vec<String> = service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|points| {
            points
                .iter()
                .filter_map(|p| p.ip.clone().or_else(|| p.hostname.clone()))
                .collect()
        })
        .unwrap_or_default();

    if let Some(ips) = service.spec.as_ref().and_then(|s| s.external_ips.as_ref()) {
        addresses.extend(ips.iter().cloned());
    }

    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, ServiceSpec, ServiceStatus,
    };

    #[test]
    fn test_external_addresses_from_status() {
        let service = Service {
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus {
                    ingress: Some(vec![
                        LoadBalancerIngress {
                            ip: Some("172.18.0.2".to_string()),
                            ..Default::default()
                        },
                        LoadBalancerIngress {
                            hostname: Some("lb.example.com".to_string()),
                            ..Default::default()
                        },
                    ]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            external_addresses(&service),
            vec!["172.18.0.2".to_string(), "lb.example.com".to_string()]
        );
    }

    #[test]
    fn test_external_addresses_from_spec() {
        let service = Service {
            spec: Some(ServiceSpec {
                external_ips: Some(vec!["10.0.0.5".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(external_addresses(&service), vec!["10.0.0.5".to_string()]);
    }

    #[test]
    fn test_no_addresses() {
        assert!(external_addresses(&Service::default()).is_empty());
    }
}
