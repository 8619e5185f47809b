//! Mock engine client for testing
//!
//! Answers from in-memory state, useful for unit tests without a running
//! container engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::client::{ContainerInspect, EngineClient, EngineResources, EngineVersion};
use crate::error::{DockerError, Result};

/// In-memory engine client for testing
#[derive(Clone)]
pub struct MockEngineClient {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

struct MockState {
    version: Option<EngineVersion>,
    resources: Option<EngineResources>,
    containers: HashMap<String, ContainerInspect>,
    inspect_failure: Option<String>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub versions: usize,
    pub infos: usize,
    pub inspects: usize,
}

impl MockEngineClient {
    /// Reachable engine with no containers
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                version: Some(EngineVersion {
                    version: "27.0.3".to_string(),
                    arch: "amd64".to_string(),
                    platform: "Docker Engine - Community".to_string(),
                    os: "linux".to_string(),
                }),
                resources: Some(EngineResources {
                    cpus: 8,
                    memory_bytes: 16 * 1024 * 1024 * 1024,
                }),
                containers: HashMap::new(),
                inspect_failure: None,
            })),
            operations: Arc::new(RwLock::new(OperationCounts::default())),
        }
    }

    /// Engine whose version query fails
    pub fn unreachable() -> Self {
        let client = Self::new();
        client.state.write().unwrap().version = None;
        client
    }

    /// Add or replace a container
    pub fn with_container(self, container: ContainerInspect) -> Self {
        self.state
            .write()
            .unwrap()
            .containers
            .insert(container.name.clone(), container);
        self
    }

    /// Make `info` fail
    pub fn without_resources(self) -> Self {
        self.state.write().unwrap().resources = None;
        self
    }

    /// Make every inspect call fail with `message`
    pub fn failing_inspect(self, message: impl Into<String>) -> Self {
        self.state.write().unwrap().inspect_failure = Some(message.into());
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }
}

impl Default for MockEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineClient for MockEngineClient {
    async fn version(&self) -> Result<EngineVersion> {
        self.operations.write().unwrap().versions += 1;

        self.state
            .read()
            .unwrap()
            .version
            .clone()
            .ok_or_else(|| DockerError::CommandFailed {
                command: "docker version".to_string(),
                stderr: "Cannot connect to the Docker daemon".to_string(),
            })
    }

    async fn info(&self) -> Result<EngineResources> {
        self.operations.write().unwrap().infos += 1;

        self.state
            .read()
            .unwrap()
            .resources
            .ok_or_else(|| DockerError::CommandFailed {
                command: "docker info".to_string(),
                stderr: "info unavailable".to_string(),
            })
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>> {
        self.operations.write().unwrap().inspects += 1;

        let state = self.state.read().unwrap();
        if let Some(message) = &state.inspect_failure {
            return Err(DockerError::CommandFailed {
                command: format!("docker container inspect {}", name),
                stderr: message.clone(),
            });
        }
        Ok(state.containers.get(name).cloned())
    }
}
