//! Chart deployment request and result types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A service whose external address is checked when a deploy times out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRef {
    pub name: String,
    pub namespace: String,
}

impl ServiceRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// One deployable package
///
/// Built per deployment call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRequest {
    /// Logical name used in logs and telemetry keys
    pub name: String,

    /// Repository name registered with the package manager
    pub repo_name: String,

    /// Repository URL
    pub repo_url: String,

    /// Chart identifier within the repository
    pub chart: String,

    /// Pinned chart version (latest when unset)
    pub version: Option<String>,

    /// Release name
    pub release: String,

    /// Target namespace (created when missing)
    pub namespace: String,

    /// Ordered `key=value` overrides
    pub values: Vec<String>,

    /// Optional values file
    pub values_file: Option<PathBuf>,

    /// Controller service probed when the deploy times out waiting
    pub controller_service: Option<ServiceRef>,
}

impl ChartRequest {
    /// Create a request with no overrides
    pub fn new(
        name: impl Into<String>,
        repo_name: impl Into<String>,
        repo_url: impl Into<String>,
        chart: impl Into<String>,
        release: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            repo_name: repo_name.into(),
            repo_url: repo_url.into(),
            chart: chart.into(),
            version: None,
            release: release.into(),
            namespace: namespace.into(),
            values: Vec::new(),
            values_file: None,
            controller_service: None,
        }
    }

    /// Fully qualified chart reference (`repo/chart`)
    pub fn chart_ref(&self) -> String {
        format!("{}/{}", self.repo_name, self.chart)
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_values_file(mut self, path: Option<PathBuf>) -> Self {
        self.values_file = path;
        self
    }

    pub fn with_controller_service(mut self, service: ServiceRef) -> Self {
        self.controller_service = Some(service);
        self
    }
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRelease {
    /// Release name
    pub name: String,

    /// Namespace the release lives in
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Chart version that was deployed
    pub chart_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_ref_and_builders() {
        let request = ChartRequest::new(
            "ingress",
            "ingress-nginx",
            "https://kubernetes.github.io/ingress-nginx",
            "ingress-nginx",
            "ingress-nginx",
            "ingress-nginx",
        )
        .with_values(["a=1", "b=2"])
        .with_version(Some("4.11.3".to_string()))
        .with_controller_service(ServiceRef::new("ingress-nginx-controller", "ingress-nginx"));

        assert_eq!(request.chart_ref(), "ingress-nginx/ingress-nginx");
        assert_eq!(request.values, vec!["a=1", "b=2"]);
        assert_eq!(request.version.as_deref(), Some("4.11.3"));
        assert_eq!(
            request.controller_service.unwrap().name,
            "ingress-nginx-controller"
        );
    }
}
