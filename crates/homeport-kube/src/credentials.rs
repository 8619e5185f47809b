//! Basic-auth credential secret
//!
//! The ingress controller reads `user:bcrypt-hash` from the `auth` key of the
//! secret. Every install writes the secret from scratch, so stale keys from an
//! earlier install never survive.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::api::ClusterApi;
use crate::error::{KubeError, Result};

/// Secret key holding the htpasswd line
pub const AUTH_KEY: &str = "auth";

/// Label marking resources written by homeport
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Writes the basic-auth secret
pub struct CredentialManager {
    api: Arc<dyn ClusterApi>,
    secret_name: String,
    cost: u32,
}

impl CredentialManager {
    pub fn new(api: Arc<dyn ClusterApi>, secret_name: impl Into<String>) -> Self {
        Self {
            api,
            secret_name: secret_name.into(),
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost factor
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    /// Create or fully replace the secret with a fresh hash of `password`
    pub async fn ensure_basic_auth(&self, namespace: &str, user: &str, password: &str) -> Result<()> {
        validate(user, password)?;

        let line = htpasswd_line(user, password, self.cost).await?;
        let mut secret = build_secret(&self.secret_name, namespace, line);

        match self.api.get_secret(namespace, &self.secret_name).await? {
            Some(existing) => {
                secret.metadata.resource_version = existing.metadata.resource_version;
                self.api.replace_secret(namespace, &secret).await?;
                tracing::info!(namespace, secret = %self.secret_name, "replaced basic-auth secret");
            }
            None => {
                self.api.create_secret(namespace, &secret).await?;
                tracing::info!(namespace, secret = %self.secret_name, "created basic-auth secret");
            }
        }

        Ok(())
    }
}

fn validate(user: &str, password: &str) -> Result<()> {
    if user.is_empty() {
        return Err(KubeError::InvalidCredentials("username cannot be empty".to_string()));
    }
    if user.contains(':') {
        return Err(KubeError::InvalidCredentials(
            "username cannot contain ':'".to_string(),
        ));
    }
    if password.is_empty() {
        return Err(KubeError::InvalidCredentials("password cannot be empty".to_string()));
    }
    Ok(())
}

/// Hash off the async runtime; bcrypt is deliberately slow
async fn htpasswd_line(user: &str, password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| KubeError::Hash(e.to_string()))?
        .map_err(|e| KubeError::Hash(e.to_string()))?;
    Ok(format!("{}:{}", user, hash))
}

fn build_secret(name: &str, namespace: &str, line: String) -> Secret {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), "homeport".to_string());

    let mut data = BTreeMap::new();
    data.insert(AUTH_KEY.to_string(), ByteString(line.into_bytes()));

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}
