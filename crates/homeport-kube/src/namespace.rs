//! Namespace deletion with a bounded wait
//!
//! Deleting a namespace only starts termination. The poll checks existence on
//! every tick until the namespace is gone, the deadline fires, or the caller
//! cancels; whichever comes first wins and the ticker stops with it.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::ClusterApi;
use crate::error::{KubeError, Result};

/// Shortest tick the poll will use
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll cadence and deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceWait {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for NamespaceWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Delete `name` and wait until it no longer exists
///
/// The delete call itself runs under the same deadline and cancellation as
/// the poll. Failed existence checks are logged and polling continues. A zero
/// interval is raised to [`MIN_POLL_INTERVAL`].
pub async fn delete_namespace_and_wait(
    api: &dyn ClusterApi,
    name: &str,
    wait: NamespaceWait,
    cancel: &CancellationToken,
) -> Result<()> {
    let period = wait.interval.max(MIN_POLL_INTERVAL);

    let poll = async {
        api.delete_namespace(name).await?;
        tracing::debug!(namespace = name, timeout = ?wait.timeout, "waiting for namespace deletion");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match api.namespace_exists(name).await {
                Ok(false) => return Ok::<(), KubeError>(()),
                Ok(true) => tracing::trace!(namespace = name, "namespace still terminating"),
                Err(e) => {
                    tracing::debug!(namespace = name, error = %e, "namespace check failed, retrying")
                }
            }
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(KubeError::Cancelled),
        _ = tokio::time::sleep(wait.timeout) => Err(KubeError::NamespaceDeleteTimeout {
            namespace: name.to_string(),
            timeout: wait.timeout,
        }),
        result = poll => {
            result?;
            tracing::info!(namespace = name, "namespace deleted");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClusterApi;

    fn fast() -> NamespaceWait {
        NamespaceWait {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_converges_after_ticks() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_deletion_checks(3);

        delete_namespace_and_wait(&api, "homeport", fast(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!api.has_namespace("homeport"));
        assert_eq!(api.operation_counts().namespace_checks, 4);
    }

    #[tokio::test]
    async fn test_missing_namespace_returns_immediately() {
        let api = MockClusterApi::new();
        delete_namespace_and_wait(&api, "homeport", fast(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(api.operation_counts().namespace_checks, 1);
    }

    #[tokio::test]
    async fn test_times_out() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_stuck_namespaces();
        let wait = NamespaceWait {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(100),
        };

        let err = delete_namespace_and_wait(&api, "homeport", wait, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::NamespaceDeleteTimeout { .. }));
        assert!(api.has_namespace("homeport"));
    }

    #[tokio::test]
    async fn test_check_errors_keep_polling() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_failing_checks(2);

        delete_namespace_and_wait(&api, "homeport", fast(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(api.operation_counts().namespace_checks, 3);
    }

    #[tokio::test]
    async fn test_zero_interval_still_polls() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_deletion_checks(2);
        let wait = NamespaceWait {
            interval: Duration::ZERO,
            timeout: Duration::from_millis(500),
        };

        delete_namespace_and_wait(&api, "homeport", wait, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!api.has_namespace("homeport"));
        assert_eq!(api.operation_counts().namespace_checks, 3);
    }

    #[tokio::test]
    async fn test_hung_delete_times_out() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_hanging_deletes();
        let wait = NamespaceWait {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(100),
        };

        let err = delete_namespace_and_wait(&api, "homeport", wait, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::NamespaceDeleteTimeout { .. }));
        assert_eq!(api.operation_counts().namespace_checks, 0);
    }

    #[tokio::test]
    async fn test_hung_delete_cancelled() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_hanging_deletes();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = delete_namespace_and_wait(&api, "homeport", fast(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let api = MockClusterApi::new()
            .with_namespace("homeport")
            .with_stuck_namespaces();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = delete_namespace_and_wait(&api, "homeport", fast(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Cancelled));
    }
}
