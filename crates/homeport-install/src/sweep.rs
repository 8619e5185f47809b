//! Best-effort removal of what an install deployed
//!
//! Each step runs regardless of the previous one and reports a warning on
//! failure; the caller decides whether to go on and delete the cluster.

use std::sync::Arc;

use homeport_core::{StepOutcome, StepReporter};
use homeport_helm::{ChartDeployer, RemoveOutcome};
use homeport_kube::{ClusterApi, KubeError, NamespaceWait};
use tokio_util::sync::CancellationToken;

use crate::error::InstallError;

/// A release to remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub release: String,
    pub namespace: String,
}

impl ReleaseTarget {
    pub fn new(release: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            namespace: namespace.into(),
        }
    }
}

/// Removes both charts, then the application namespace
pub struct UninstallSweep {
    deployer: ChartDeployer,
    cluster: Arc<dyn ClusterApi>,
    app: ReleaseTarget,
    ingress: ReleaseTarget,
    namespace: String,
    wait: NamespaceWait,
    cancel: CancellationToken,
}

impl UninstallSweep {
    pub fn new(
        deployer: ChartDeployer,
        cluster: Arc<dyn ClusterApi>,
        app: ReleaseTarget,
        ingress: ReleaseTarget,
        namespace: impl Into<String>,
        wait: NamespaceWait,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            deployer,
            cluster,
            app,
            ingress,
            namespace: namespace.into(),
            wait,
            cancel,
        }
    }

    /// Run every step, returning one outcome per step
    ///
    /// Only cancellation stops the sweep early, including in the middle of a
    /// release removal.
    pub async fn run(&self, reporter: &dyn StepReporter) -> Result<Vec<StepOutcome>, InstallError> {
        let mut outcomes = Vec::new();

        for target in [&self.app, &self.ingress] {
            let step = format!("remove {}", target.release);
            let removal = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(InstallError::Cancelled),
                result = self.deployer.remove(&target.release, &target.namespace) => result,
            };
            let outcome = match removal {
                Ok(RemoveOutcome::Removed) => {
                    StepOutcome::ok(&step, format!("release '{}' removed", target.release))
                }
                Ok(RemoveOutcome::NotFound) => StepOutcome::ok(
                    &step,
                    format!("release '{}' already removed", target.release),
                ),
                Err(e) => StepOutcome::warn(
                    &step,
                    format!("failed to remove release '{}': {}", target.release, e),
                ),
            };
            reporter.report(&outcome);
            outcomes.push(outcome);
        }

        let step = "delete namespace";
        let outcome = match homeport_kube::delete_namespace_and_wait(
            self.cluster.as_ref(),
            &self.namespace,
            self.wait,
            &self.cancel,
        )
        .await
        {
            Ok(()) => StepOutcome::ok(step, format!("namespace '{}' deleted", self.namespace)),
            Err(KubeError::Cancelled) => return Err(InstallError::Cancelled),
            Err(KubeError::NamespaceDeleteTimeout { namespace, timeout }) => {
                let e = InstallError::NamespaceDeleteTimeout { namespace, timeout };
                StepOutcome::warn(step, e.to_string())
            }
            Err(e) => StepOutcome::warn(
                step,
                format!("failed to delete namespace '{}': {}", self.namespace, e),
            ),
        };
        reporter.report(&outcome);
        outcomes.push(outcome);

        Ok(outcomes)
    }
}
