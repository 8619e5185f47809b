//! homeport Helm - chart deployment for the install engine
//!
//! This crate provides:
//! - [`ChartClient`]: repository, chart and release operations of a package manager
//! - [`HelmCli`]: the default client, driving the `helm` binary
//! - [`ChartDeployer`]: repo refresh, chart fetch and install-or-upgrade, with
//!   wait-timeout reclassification into ingress port conflicts
//! - [`MockChartClient`]: in-memory client for tests

pub mod cli;
pub mod client;
pub mod deployer;
pub mod error;
pub mod mock;

pub use cli::HelmCli;
pub use client::{ChartClient, ChartMetadata, InstallSpec, ReleaseInfo, RepoEntry};
pub use deployer::{ChartDeployer, RemoveOutcome};
pub use error::{HelmError, Result};
pub use mock::{MockChartClient, OperationCounts};
