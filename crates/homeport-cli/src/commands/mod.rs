//! CLI commands

pub mod install;
pub mod uninstall;

use std::path::Path;
use std::sync::Arc;

use homeport_core::{Provider, Settings, TracingTelemetry, provider::KIND};
use homeport_install::{ClusterGateway, ExternalGateway, KindGateway, Orchestrator, SystemClients};
use tokio_util::sync::CancellationToken;

use crate::display::ConsoleReporter;
use crate::error::Result;

/// Settings and provider shared by every command
pub struct Context {
    pub settings: Settings,
    pub provider: Provider,
    pub cancel: CancellationToken,
}

impl Context {
    /// Load settings from `config` (or the default location) and resolve the provider
    pub fn load(
        config: Option<&Path>,
        provider: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let mut settings = match config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        if let Some(name) = provider {
            settings.provider = name.to_string();
        }

        let kubeconfig = settings.kubeconfig()?;
        let provider = Provider::from_name(&settings.provider, &settings.cluster_name, kubeconfig)?;
        tracing::debug!(provider = %provider.name, cluster = %provider.cluster_name, "resolved provider");

        Ok(Self {
            settings,
            provider,
            cancel,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let gateway: Arc<dyn ClusterGateway> = if self.provider.name == KIND {
            Arc::new(KindGateway::new(
                &self.provider.cluster_name,
                &self.provider.kubeconfig,
            ))
        } else {
            Arc::new(ExternalGateway)
        };

        Orchestrator::new(
            self.settings.clone(),
            self.provider.clone(),
            Arc::new(SystemClients),
            gateway,
            self.cancel.clone(),
        )
        .with_reporter(Arc::new(ConsoleReporter::new()))
        .with_telemetry(Arc::new(TracingTelemetry))
    }
}
