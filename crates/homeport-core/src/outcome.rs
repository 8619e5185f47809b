//! Per-phase outcomes handed to the presentation layer

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Warn,
    Fail,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        };
        write!(f, "{}", s)
    }
}

/// Result of one orchestration phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    /// Phase name (`preflight`, `cluster`, ...)
    pub step: String,

    pub status: StepStatus,

    /// Human readable message
    pub message: String,

    pub at: DateTime<Utc>,
}

impl StepOutcome {
    pub fn ok(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Ok, message)
    }

    pub fn warn(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Warn, message)
    }

    pub fn fail(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Fail, message)
    }

    fn new(step: impl Into<String>, status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Receives step outcomes as they happen
pub trait StepReporter: Send + Sync {
    fn report(&self, outcome: &StepOutcome);
}

/// Logs outcomes through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StepReporter for TracingReporter {
    fn report(&self, outcome: &StepOutcome) {
        match outcome.status {
            StepStatus::Ok => tracing::info!(step = %outcome.step, "{}", outcome.message),
            StepStatus::Warn => tracing::warn!(step = %outcome.step, "{}", outcome.message),
            StepStatus::Fail => tracing::error!(step = %outcome.step, "{}", outcome.message),
        }
    }
}

/// Keeps outcomes in memory, in report order
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    outcomes: Arc<RwLock<Vec<StepOutcome>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<StepOutcome> {
        self.outcomes.read().map(|o| o.clone()).unwrap_or_default()
    }

    /// Outcomes with the given status
    pub fn with_status(&self, status: StepStatus) -> Vec<StepOutcome> {
        self.outcomes()
            .into_iter()
            .filter(|o| o.status == status)
            .collect()
    }
}

impl StepReporter for MemoryReporter {
    fn report(&self, outcome: &StepOutcome) {
        if let Ok(mut outcomes) = self.outcomes.write() {
            outcomes.push(outcome.clone());
        }
    }
}
