//! Recover the ingress port of an existing cluster
//!
//! A kind cluster fixes its host port mapping at creation, so reinstalling
//! into it must use whatever port the control-plane container publishes.

use std::sync::Arc;

use homeport_core::Provider;
use homeport_docker::{EngineClient, PortBinding};

use crate::error::{InstallError, Result};

/// Reads published ports from the control-plane container
pub struct PortResolver {
    engine: Arc<dyn EngineClient>,
}

impl PortResolver {
    pub fn new(engine: Arc<dyn EngineClient>) -> Self {
        Self { engine }
    }

    /// First host port bound on every interface, by container port
    pub async fn resolve_bound_port(&self, provider: &Provider) -> Result<u16> {
        let name = provider.control_plane_container();

        let container = self
            .engine
            .inspect_container(&name)
            .await
            .map_err(|source| InstallError::InspectFailed {
                name: name.clone(),
                source,
            })?;

        let container = match container {
            Some(c) if c.is_running() => c,
            Some(c) => {
                return Err(InstallError::ContainerNotRunning {
                    name,
                    status: c.status,
                });
            }
            None => {
                return Err(InstallError::ContainerNotRunning {
                    name,
                    status: "not found".to_string(),
                });
            }
        };

        let mut ports: Vec<(u32, &Vec<PortBinding>)> = container
            .ports
            .iter()
            .map(|(port, bindings)| (container_port_number(port), bindings))
            .collect();
        ports.sort_by_key(|(number, _)| *number);

        let binding = ports
            .into_iter()
            .flat_map(|(_, bindings)| bindings.iter())
            .find(|b| b.is_wildcard())
            .ok_or_else(|| InstallError::PortNotFound { name: name.clone() })?;

        let port = binding
            .host_port
            .parse::<u16>()
            .map_err(|_| InstallError::InvalidPort {
                name: name.clone(),
                value: binding.host_port.clone(),
            })?;

        tracing::debug!(container = %name, port, "resolved bound ingress port");
        Ok(port)
    }
}

/// `80/tcp` -> 80; unparseable keys sort last
fn container_port_number(key: &str) -> u32 {
    key.split('/')
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(u32::MAX)
}
