//! Periodic reconciliation loop for a single instance.
//!
//! The controller:
//! - Loads the persisted identity before each pass
//! - Runs the reconciler under a per-pass deadline
//! - Logs failures and retries on the next tick

use std::sync::Arc;
use std::time::Duration;

use capve_vm_options::DesiredSpec;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::identity::IdentityStore;
use crate::reconciler::{InstanceReconciler, ReconcileOutcome};

/// Controller loop configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between passes.
    pub reconcile_interval: Duration,

    /// Deadline for a single pass. Dropping the pass cancels the pending step.
    pub pass_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(30),
            pass_timeout: Duration::from_secs(300),
        }
    }
}

/// Drives one instance towards its desired spec.
pub struct Controller {
    reconciler: InstanceReconciler,
    identities: Arc<dyn IdentityStore>,
    spec: DesiredSpec,
    config: ControllerConfig,
}

impl Controller {
    /// Create a new controller.
    pub fn new(
        reconciler: InstanceReconciler,
        identities: Arc<dyn IdentityStore>,
        spec: DesiredSpec,
        config: ControllerConfig,
    ) -> Self {
        Self {
            reconciler,
            identities,
            spec,
            config,
        }
    }

    /// Run the reconciliation loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            vm_name = %self.spec.name,
            reconcile_interval_secs = self.config.reconcile_interval.as_secs(),
            pass_timeout_secs = self.config.pass_timeout.as_secs(),
            "Starting reconciliation loop"
        );

        let mut interval = tokio::time::interval(self.config.reconcile_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.reconcile_once().await {
                        error!(error = %e, "Reconciliation failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Controller shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Perform a single reconciliation pass.
    pub async fn reconcile_once(&self) -> anyhow::Result<ReconcileOutcome> {
        debug!("Starting reconciliation");

        let identity = self.identities.load(&self.spec.name).await?;
        debug!(
            provisioned = identity.is_provisioned(),
            vmid = ?identity.vmid,
            "Loaded instance identity"
        );

        let pass = self.reconciler.reconcile(&self.spec, identity);
        match tokio::time::timeout(self.config.pass_timeout, pass).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                warn!(reason = e.reason_code(), "Reconciliation pass failed, will retry");
                Err(e.into())
            }
            Err(_) => anyhow::bail!(
                "reconciliation pass timed out after {:?}",
                self.config.pass_timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.reconcile_interval, Duration::from_secs(30));
        assert_eq!(config.pass_timeout, Duration::from_secs(300));
    }
}
