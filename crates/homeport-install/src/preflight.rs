//! Pre-flight checks
//!
//! Confirms the container engine answers and that the ingress port is either
//! free or already served by a homeport ingress from an earlier install.

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use homeport_core::TelemetrySink;
use homeport_docker::EngineClient;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use tokio::sync::OnceCell;

use crate::clients::ClientFactory;
use crate::error::{InstallError, Result};

/// Ports below this need elevated privileges and are not probed
pub const PRIVILEGED_PORT_LIMIT: u16 = 1024;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the engine reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub version: String,
    pub arch: String,
    pub platform: String,
    pub os: String,
    pub cpus: Option<u64>,
    pub memory_bytes: Option<u64>,
}

/// Why a port check passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Nothing listens on the port
    Free,
    /// Below [`PRIVILEGED_PORT_LIMIT`]; not probed
    Privileged,
    /// Answered by the auth challenge of an earlier install
    ServedByHomeport,
}

/// Engine and port checks run before anything is changed
pub struct PreflightChecker {
    clients: Arc<dyn ClientFactory>,
    engine: OnceCell<Arc<dyn EngineClient>>,
    telemetry: Arc<dyn TelemetrySink>,
    http: reqwest::Client,
    marker: String,
}

impl PreflightChecker {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        telemetry: Arc<dyn TelemetrySink>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            engine: OnceCell::new(),
            telemetry,
            http: probe_client(DEFAULT_PROBE_TIMEOUT),
            marker: marker.into(),
        }
    }

    /// Bound the HTTP probe of an occupied port
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.http = probe_client(timeout);
        self
    }

    /// Engine client, constructed on first use
    pub async fn engine(&self) -> Result<Arc<dyn EngineClient>> {
        self.engine
            .get_or_try_init(|| async { self.clients.engine() })
            .await
            .cloned()
            .map_err(|source| InstallError::EngineUnreachable { source })
    }

    /// Verify the engine answers and record what it reports
    pub async fn check_container_engine(&self) -> Result<EngineInfo> {
        let engine = self.engine().await?;
        let version = engine
            .version()
            .await
            .map_err(|source| InstallError::EngineUnreachable { source })?;

        let resources = match engine.info().await {
            Ok(resources) => Some(resources),
            Err(e) => {
                tracing::debug!(error = %e, "engine resources unavailable");
                None
            }
        };

        let info = EngineInfo {
            version: version.version,
            arch: version.arch,
            platform: version.platform,
            os: version.os,
            cpus: resources.map(|r| r.cpus),
            memory_bytes: resources.map(|r| r.memory_bytes),
        };

        self.telemetry.attr("docker_version", &info.version);
        self.telemetry.attr("docker_arch", &info.arch);
        self.telemetry.attr("docker_platform", &info.platform);
        if let Some(cpus) = info.cpus {
            self.telemetry.attr("docker_ncpu", &cpus.to_string());
        }
        if let Some(memory) = info.memory_bytes {
            self.telemetry.attr("docker_mem", &memory.to_string());
        }

        tracing::debug!(version = %info.version, arch = %info.arch, "container engine reachable");
        Ok(info)
    }

    /// Verify `port` is free, or already answered by a homeport ingress
    pub async fn check_port_available(&self, port: u16) -> Result<PortStatus> {
        if port < PRIVILEGED_PORT_LIMIT {
            tracing::warn!(port, "port is privileged, skipping availability check");
            return Ok(PortStatus::Privileged);
        }

        let err = match tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => {
                drop(listener);
                tracing::debug!(port, "port is free");
                return Ok(PortStatus::Free);
            }
            Err(e) => e,
        };

        if !is_addr_in_use(&err) {
            return Err(InstallError::PortProbe { port, source: err });
        }

        tracing::debug!(port, "port in use, checking for an existing install");
        match self.http.get(format!("http://localhost:{}", port)).send().await {
            Ok(resp)
                if resp.status() == StatusCode::UNAUTHORIZED
                    && challenges_with_marker(resp.headers(), &self.marker) =>
            {
                tracing::info!(port, "port is served by an existing homeport install");
                Ok(PortStatus::ServedByHomeport)
            }
            Ok(resp) => {
                tracing::debug!(port, status = %resp.status(), "port is held by something else");
                Err(InstallError::PortUnavailable { port })
            }
            Err(e) => {
                tracing::debug!(port, error = %e, "port is held by something else");
                Err(InstallError::PortUnavailable { port })
            }
        }
    }
}

fn probe_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Address-in-use, by kind or by raw OS code
pub(crate) fn is_addr_in_use(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::AddrInUse {
        return true;
    }
    matches!(
        (std::env::consts::OS, err.raw_os_error()),
        ("linux", Some(98)) | ("macos", Some(48)) | ("windows", Some(10048))
    )
}

/// A basic-auth challenge whose realm carries `marker`
pub(crate) fn challenges_with_marker(headers: &HeaderMap, marker: &str) -> bool {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(marker))
}
