//! Engine client backed by the `docker` binary
//!
//! Every call spawns the CLI with `--format {{json ...}}` and parses the JSON
//! it prints. Child processes are killed if the calling future is dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::client::{ContainerInspect, EngineClient, EngineResources, EngineVersion, PortBinding};
use crate::error::{DockerError, Result};

/// Default engine binary
const DOCKER_BINARY: &str = "docker";

/// `docker` CLI client
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Locate `docker` on PATH
    pub fn connect() -> Result<Self> {
        Self::with_binary(DOCKER_BINARY)
    }

    /// Locate a specific binary (absolute path or name on PATH)
    pub fn with_binary(binary: impl AsRef<Path>) -> Result<Self> {
        let binary = binary.as_ref();
        let resolved = find_binary(binary).ok_or_else(|| DockerError::NotInstalled {
            binary: binary.display().to_string(),
        })?;
        tracing::debug!(binary = %resolved.display(), "using container engine CLI");
        Ok(Self { binary: resolved })
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl EngineClient for DockerCli {
    async fn version(&self) -> Result<EngineVersion> {
        let out = self
            .run(&["version", "--format", "{{json .Server}}"])
            .await?;
        parse_version(&out)
    }

    async fn info(&self) -> Result<EngineResources> {
        let out = self.run(&["info", "--format", "{{json .}}"]).await?;
        parse_info(&out)
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>> {
        match self.run(&["container", "inspect", name]).await {
            Ok(out) => parse_inspect(&out),
            Err(DockerError::CommandFailed { stderr, .. }) if is_no_such_container(&stderr) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn find_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}

fn is_no_such_container(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("no such container") || lower.contains("no such object")
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServerVersion {
    version: String,
    #[serde(default)]
    arch: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    platform: Option<ServerPlatform>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServerPlatform {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ServerInfo {
    #[serde(rename = "NCPU", default)]
    ncpu: u64,
    #[serde(rename = "MemTotal", default)]
    mem_total: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    name: String,
    state: InspectState,
    network_settings: InspectNetwork,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<InspectBinding>>>>,
}

#[derive(Deserialize)]
struct InspectBinding {
    #[serde(rename = "HostIp", default)]
    host_ip: String,
    #[serde(rename = "HostPort", default)]
    host_port: String,
}

fn parse_error(command: &str, e: serde_json::Error) -> DockerError {
    DockerError::Parse {
        command: command.to_string(),
        message: e.to_string(),
    }
}

fn parse_version(out: &[u8]) -> Result<EngineVersion> {
    let server: ServerVersion =
        serde_json::from_slice(out).map_err(|e| parse_error("docker version", e))?;
    Ok(EngineVersion {
        version: server.version,
        arch: server.arch,
        os: server.os,
        platform: server.platform.map(|p| p.name).unwrap_or_default(),
    })
}

fn parse_info(out: &[u8]) -> Result<EngineResources> {
    let info: ServerInfo = serde_json::from_slice(out).map_err(|e| parse_error("docker info", e))?;
    Ok(EngineResources {
        cpus: info.ncpu,
        memory_bytes: info.mem_total,
    })
}

fn parse_inspect(out: &[u8]) -> Result<Option<ContainerInspect>> {
    let entries: Vec<InspectEntry> =
        serde_json::from_slice(out).map_err(|e| parse_error("docker container inspect", e))?;

    Ok(entries.into_iter().next().map(|entry| {
        let ports = entry
            .network_settings
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(|(port, bindings)| {
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| PortBinding::new(b.host_ip, b.host_port))
                    .collect();
                (port, bindings)
            })
            .collect();

        ContainerInspect {
            name: entry.name.trim_start_matches('/').to_string(),
            status: entry.state.status,
            ports,
        }
    }))
}
