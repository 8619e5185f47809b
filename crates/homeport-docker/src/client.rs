//! Engine client trait and the data it returns

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server version details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVersion {
    pub version: String,
    pub arch: String,
    pub platform: String,
    pub os: String,
}

/// Host resources visible to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineResources {
    pub cpus: u64,
    pub memory_bytes: u64,
}

/// One published port of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host interface (`0.0.0.0` for every interface)
    pub host_ip: String,

    /// Host port as reported by the engine
    pub host_port: String,
}

impl PortBinding {
    pub fn new(host_ip: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            host_port: host_port.into(),
        }
    }

    /// Whether the binding listens on every host interface
    pub fn is_wildcard(&self) -> bool {
        matches!(self.host_ip.as_str(), "" | "0.0.0.0" | "::")
    }
}

/// Subset of a container's inspect data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInspect {
    /// Container name without the leading `/`
    pub name: String,

    /// Engine state (`running`, `exited`, ...)
    pub status: String,

    /// Container port (`80/tcp`) to host bindings, ordered by container port
    pub ports: BTreeMap<String, Vec<PortBinding>>,
}

impl ContainerInspect {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            ports: BTreeMap::new(),
        }
    }

    pub fn with_binding(mut self, container_port: &str, binding: PortBinding) -> Self {
        self.ports
            .entry(container_port.to_string())
            .or_default()
            .push(binding);
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Container engine capabilities used by the install engine
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Server version; failure means the engine is unreachable
    async fn version(&self) -> Result<EngineVersion>;

    /// CPU and memory available to the engine
    async fn info(&self) -> Result<EngineResources>;

    /// Inspect a container by name, `None` when it does not exist
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_binding() {
        assert!(PortBinding::new("0.0.0.0", "80").is_wildcard());
        assert!(PortBinding::new("", "80").is_wildcard());
        assert!(PortBinding::new("::", "80").is_wildcard());
        assert!(!PortBinding::new("127.0.0.1", "6443").is_wildcard());
    }

    #[test]
    fn test_container_builder() {
        let container = ContainerInspect::new("homeport-control-plane", "running")
            .with_binding("80/tcp", PortBinding::new("0.0.0.0", "8000"))
            .with_binding("6443/tcp", PortBinding::new("127.0.0.1", "40123"));

        assert!(container.is_running());
        assert_eq!(container.ports.len(), 2);
        assert_eq!(container.ports["80/tcp"][0].host_port, "8000");
    }
}
