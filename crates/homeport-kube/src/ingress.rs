//! Ingress for the web front end
//!
//! One ingress routes every configured host to the web service, guarded by
//! nginx basic auth. The realm carries the marker so a later port probe can
//! recognise an ingress installed by us.

use std::collections::BTreeMap;
use std::sync::Arc;

use homeport_core::IngressRuleSet;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::api::ClusterApi;
use crate::credentials::MANAGED_BY_LABEL;
use crate::error::Result;

/// Ingress class served by ingress-nginx
pub const INGRESS_CLASS: &str = "nginx";

pub const AUTH_TYPE_ANNOTATION: &str = "nginx.ingress.kubernetes.io/auth-type";
pub const AUTH_SECRET_ANNOTATION: &str = "nginx.ingress.kubernetes.io/auth-secret";
pub const AUTH_REALM_ANNOTATION: &str = "nginx.ingress.kubernetes.io/auth-realm";

/// What `ensure_ingress` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressAction {
    Created,
    Replaced,
}

/// Builds and applies the front-end ingress
pub struct IngressManager {
    api: Arc<dyn ClusterApi>,
    name: String,
    auth_secret: String,
    marker: String,
}

impl IngressManager {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        name: impl Into<String>,
        auth_secret: impl Into<String>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            api,
            name: name.into(),
            auth_secret: auth_secret.into(),
            marker: marker.into(),
        }
    }

    /// Realm shown by the browser's auth prompt
    pub fn realm(&self) -> String {
        format!("{} - authentication required", self.marker)
    }

    /// Build the ingress object for `rules`
    pub fn build(&self, namespace: &str, rules: &IngressRuleSet) -> Ingress {
        let mut annotations = BTreeMap::new();
        annotations.insert(AUTH_TYPE_ANNOTATION.to_string(), "basic".to_string());
        annotations.insert(AUTH_SECRET_ANNOTATION.to_string(), self.auth_secret.clone());
        annotations.insert(AUTH_REALM_ANNOTATION.to_string(), self.realm());

        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), "homeport".to_string());

        let backend = IngressBackend {
            service: Some(IngressServiceBackend {
                name: rules.service.clone(),
                port: Some(ServiceBackendPort {
                    name: Some(rules.port_name.clone()),
                    number: None,
                }),
            }),
            ..Default::default()
        };

        let ingress_rules = rules
            .rules
            .iter()
            .map(|rule| IngressRule {
                host: Some(rule.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some(rule.path.clone()),
                        path_type: "Prefix".to_string(),
                        backend: backend.clone(),
                    }],
                }),
            })
            .collect();

        Ingress {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace.to_string()),
                annotations: Some(annotations),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some(INGRESS_CLASS.to_string()),
                rules: Some(ingress_rules),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Create the ingress, or replace it wholesale when it already exists
    pub async fn ensure_ingress(
        &self,
        namespace: &str,
        rules: &IngressRuleSet,
    ) -> Result<IngressAction> {
        let mut ingress = self.build(namespace, rules);

        match self.api.get_ingress(namespace, &self.name).await? {
            Some(existing) => {
                ingress.metadata.resource_version = existing.metadata.resource_version;
                self.api.replace_ingress(namespace, &ingress).await?;
                tracing::info!(namespace, ingress = %self.name, hosts = ?rules.hosts(), "replaced ingress");
                Ok(IngressAction::Replaced)
            }
            None => {
                self.api.create_ingress(namespace, &ingress).await?;
                tracing::info!(namespace, ingress = %self.name, hosts = ?rules.hosts(), "created ingress");
                Ok(IngressAction::Created)
            }
        }
    }
}
