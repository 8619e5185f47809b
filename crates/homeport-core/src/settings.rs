//! User settings
//!
//! Stored in `~/.config/homeport/config.yaml`. Every field has a default, so a
//! partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chart::ChartRequest;
use crate::error::{CoreError, Result};

/// Where a chart comes from and where it is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSource {
    pub repo_name: String,
    pub repo_url: String,
    pub chart: String,
    pub release: String,
    pub namespace: String,
}

impl ChartSource {
    /// Build a deploy request for this source
    pub fn request(&self, name: &str) -> ChartRequest {
        ChartRequest::new(
            name,
            &self.repo_name,
            &self.repo_url,
            &self.chart,
            &self.release,
            &self.namespace,
        )
    }
}

/// homeport settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// API version
    pub api_version: String,

    /// Provider preset (`kind` or `external`)
    pub provider: String,

    /// Local cluster name
    pub cluster_name: String,

    /// Default ingress port
    pub port: u16,

    /// Marker placed in the auth realm, used to recognise our own ingress
    pub marker: String,

    /// Application chart
    pub app_chart: ChartSource,

    /// Ingress-controller chart
    pub ingress_chart: ChartSource,

    /// Ingress-controller service probed on deploy timeouts
    pub controller_service: String,

    /// Web front-end service targeted by the ingress
    pub web_service: String,

    /// Ingress resource name
    pub ingress_name: String,

    /// Basic-auth secret name
    pub auth_secret: String,

    /// Local data directory mounted into the cluster node
    pub data_dir: Option<PathBuf>,

    /// Kubeconfig written for the local cluster
    pub kubeconfig: Option<PathBuf>,

    /// Wait timeout for chart installs
    #[serde(with = "humantime_serde")]
    pub chart_timeout: Duration,

    /// Deadline for namespace deletion during uninstall
    #[serde(with = "humantime_serde")]
    pub namespace_delete_timeout: Duration,

    /// Deadline for the front end to answer after install
    #[serde(with = "humantime_serde")]
    pub liveness_timeout: Duration,

    /// Tick used by the namespace and liveness polls
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

/// Settings schema understood by this release
pub const API_VERSION: &str = "homeport.dev/v1";

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            provider: crate::provider::KIND.to_string(),
            cluster_name: "homeport".to_string(),
            port: 8000,
            marker: "homeport".to_string(),
            app_chart: ChartSource {
                repo_name: "homeport".to_string(),
                repo_url: "https://charts.homeport.dev".to_string(),
                chart: "homeport".to_string(),
                release: "homeport".to_string(),
                namespace: "homeport".to_string(),
            },
            ingress_chart: ChartSource {
                repo_name: "ingress-nginx".to_string(),
                repo_url: "https://kubernetes.github.io/ingress-nginx".to_string(),
                chart: "ingress-nginx".to_string(),
                release: "ingress-nginx".to_string(),
                namespace: "ingress-nginx".to_string(),
            },
            controller_service: "ingress-nginx-controller".to_string(),
            web_service: "homeport-webapp-svc".to_string(),
            ingress_name: "homeport-ingress".to_string(),
            auth_secret: "homeport-basic-auth".to_string(),
            data_dir: None,
            kubeconfig: None,
            chart_timeout: Duration::from_secs(10 * 60),
            namespace_delete_timeout: Duration::from_secs(5 * 60),
            liveness_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load settings from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&content)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Default settings path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidSettings {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("homeport").join("config.yaml"))
    }

    /// Root of homeport's local state (`~/.homeport`)
    pub fn state_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CoreError::InvalidSettings {
            message: "Could not determine home directory".to_string(),
        })?;
        Ok(home.join(".homeport"))
    }

    /// Data directory, defaulting to `~/.homeport/data`
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::state_dir()?.join("data")),
        }
    }

    /// Kubeconfig path, defaulting to `~/.homeport/<cluster>.kubeconfig`
    pub fn kubeconfig(&self) -> Result<PathBuf> {
        match &self.kubeconfig {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::state_dir()?.join(format!("{}.kubeconfig", self.cluster_name))),
        }
    }

    /// Namespace holding the application, its secret and its ingress
    pub fn namespace(&self) -> &str {
        &self.app_chart.namespace
    }

    /// Reject settings the install and uninstall flows cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(CoreError::InvalidSettings {
                message: format!(
                    "unsupported apiVersion '{}' (expected {})",
                    self.api_version, API_VERSION
                ),
            });
        }
        if self.cluster_name.trim().is_empty() {
            return Err(CoreError::InvalidSettings {
                message: "clusterName cannot be empty".to_string(),
            });
        }
        if self.marker.trim().is_empty() {
            return Err(CoreError::InvalidSettings {
                message: "marker cannot be empty".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidSettings {
                message: "pollInterval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.namespace(), "homeport");
        assert_eq!(settings.chart_timeout, Duration::from_secs(600));
        assert_eq!(settings.namespace_delete_timeout, Duration::from_secs(300));
        assert_eq!(settings.liveness_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 9000\nlivenessTimeout: 30s\nclusterName: lab\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.cluster_name, "lab");
        assert_eq!(settings.liveness_timeout, Duration::from_secs(30));
        assert_eq!(settings.ingress_chart.release, "ingress-nginx");
    }

    #[test]
    fn test_unsupported_api_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "apiVersion: homeport.dev/v2\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("homeport.dev/v2"));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let settings = Settings {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(CoreError::InvalidSettings { message }) if message.contains("pollInterval")
        ));
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "clusterName: ''\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_paths_win() {
        let settings = Settings {
            data_dir: Some(PathBuf::from("/srv/data")),
            kubeconfig: Some(PathBuf::from("/srv/kc")),
            ..Default::default()
        };
        assert_eq!(settings.data_dir().unwrap(), PathBuf::from("/srv/data"));
        assert_eq!(settings.kubeconfig().unwrap(), PathBuf::from("/srv/kc"));
    }
}
