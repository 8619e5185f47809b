//! homeport Docker - container engine access
//!
//! The install engine needs three things from the container engine: proof that
//! it is reachable (its version), best-effort host resources, and the state and
//! published ports of the cluster's control-plane container.
//!
//! - [`EngineClient`]: the capability trait
//! - [`DockerCli`]: implementation driving the `docker` binary
//! - [`MockEngineClient`]: in-memory implementation for tests

pub mod cli;
pub mod client;
pub mod error;
pub mod mock;

pub use cli::DockerCli;
pub use client::{ContainerInspect, EngineClient, EngineResources, EngineVersion, PortBinding};
pub use error::{DockerError, Result};
pub use mock::{MockEngineClient, OperationCounts};
