//! homeport Core - shared types for the local install engine
//!
//! This crate provides the value types passed between the homeport crates:
//! - `Provider`: which local cluster backend is targeted
//! - `ChartRequest` / `ChartRelease`: one package deployment and its result
//! - `IngressRuleSet`: host routing for the web front end
//! - `Settings`: user configuration with durations and chart sources
//! - `TelemetrySink`: diagnostic key/value collection
//! - `StepOutcome`: per-phase results reported to the presentation layer

pub mod chart;
pub mod error;
pub mod ingress;
pub mod outcome;
pub mod provider;
pub mod settings;
pub mod telemetry;

pub use chart::{ChartRelease, ChartRequest, ServiceRef};
pub use error::{CoreError, Result};
pub use ingress::{HOST_ALIAS, HostRule, IngressRuleSet, LOCALHOST};
pub use outcome::{MemoryReporter, StepOutcome, StepReporter, StepStatus, TracingReporter};
pub use provider::Provider;
pub use settings::{ChartSource, Settings};
pub use telemetry::{MemoryTelemetry, NoopTelemetry, TelemetrySink, TracingTelemetry};
