//! homeport Install - install and uninstall orchestration
//!
//! Sequences the container engine, the local cluster, two chart deployments,
//! the basic-auth secret, the ingress and a liveness gate; and tears it all
//! down again on uninstall.
//!
//! Every external system sits behind a capability trait with an in-memory
//! implementation, so whole runs can be exercised without Docker:
//!
//! ```no_run
//! use std::sync::Arc;
//! use homeport_core::{Provider, Settings};
//! use homeport_install::{
//!     Credentials, InstallOptions, KindGateway, Orchestrator, SystemBrowser, SystemClients,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> homeport_install::Result<()> {
//! let settings = Settings::default();
//! let kubeconfig = settings.kubeconfig()?;
//! let provider = Provider::kind(&settings.cluster_name, &kubeconfig);
//! let gateway = KindGateway::new(&settings.cluster_name, &kubeconfig);
//!
//! let orchestrator = Orchestrator::new(
//!     settings,
//!     provider,
//!     Arc::new(SystemClients),
//!     Arc::new(gateway),
//!     CancellationToken::new(),
//! );
//! let options = InstallOptions::new(8000, Credentials::new("admin", "secret"));
//! let outcome = orchestrator.install(&options, &SystemBrowser).await?;
//! println!("{}", outcome.url());
//! # Ok(())
//! # }
//! ```

pub mod clients;
pub mod cluster;
pub mod error;
pub mod liveness;
pub mod orchestrator;
pub mod port;
pub mod preflight;
pub mod sweep;

pub use clients::{ClientFactory, StaticClients, SystemClients};
pub use cluster::{
    ClusterError, ClusterGateway, ExternalGateway, KindGateway, MockClusterGateway, Mount,
    STORAGE_MOUNT_PATH,
};
pub use error::{InstallError, Result};
pub use liveness::{BrowserLauncher, LaunchOutcome, LivenessGate, RecordingBrowser, SystemBrowser};
pub use orchestrator::{
    Credentials, InstallOptions, InstallOutcome, InstallState, Orchestrator, UninstallOptions,
    UninstallOutcome, UninstallState,
};
pub use port::PortResolver;
pub use preflight::{EngineInfo, PortStatus, PreflightChecker};
pub use sweep::{ReleaseTarget, UninstallSweep};
