//! Reconciliation errors.

use capve_vm_options::OptionsError;
use thiserror::Error;

use crate::placement::SchedulerError;
use crate::platform::PlatformError;

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Fatal outcomes of a reconciliation pass.
///
/// None of these are retried inside the reconciler. The caller re-runs the
/// whole pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Looking up the recorded VM failed for a reason other than absence.
    #[error("failed to get QEMU {vmid}: {source}")]
    Lookup {
        vmid: u32,
        #[source]
        source: PlatformError,
    },

    /// A VM with the same name exists, or its absence could not be confirmed.
    #[error("QEMU {name} already exists or could not be ruled out; refusing to create a duplicate")]
    DuplicateInstance {
        name: String,
        #[source]
        source: Option<PlatformError>,
    },

    /// The desired spec could not be turned into a request.
    #[error("invalid VM options: {0}")]
    Options(#[from] OptionsError),

    /// The scheduler could not place the instance.
    #[error("failed to schedule QEMU instance: {0}")]
    Placement(#[source] SchedulerError),

    /// The OS image could not be staged on the placed node.
    #[error("failed to stage cloud image: {0:#}")]
    ImageStaging(#[source] anyhow::Error),

    /// The platform rejected the create call.
    #[error("failed to create QEMU {vmid} on node {node}: {source}")]
    Create {
        node: String,
        vmid: u32,
        #[source]
        source: PlatformError,
    },

    /// The identity could not be written after a successful lookup or create.
    #[error("failed to persist instance identity: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ReconcileError {
    /// Stable reason code for status reporting.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ReconcileError::Lookup { .. } => "lookup_failed",
            ReconcileError::DuplicateInstance { .. } => "duplicate_instance",
            ReconcileError::Options(_) => "invalid_options",
            ReconcileError::Placement(_) => "placement_failed",
            ReconcileError::ImageStaging(_) => "image_staging_failed",
            ReconcileError::Create { .. } => "create_failed",
            ReconcileError::Persistence(_) => "persistence_failed",
        }
    }

    /// Returns true if this error came from the duplicate guard.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ReconcileError::DuplicateInstance { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_duplicate_source_is_optional() {
        let found = ReconcileError::DuplicateInstance {
            name: "vm-a".to_string(),
            source: None,
        };
        assert!(found.source().is_none());
        assert!(found.is_duplicate());

        let unchecked = ReconcileError::DuplicateInstance {
            name: "vm-a".to_string(),
            source: Some(PlatformError::Transport("connection reset".to_string())),
        };
        assert!(unchecked.source().is_some());
        assert_eq!(unchecked.reason_code(), "duplicate_instance");
    }

    #[test]
    fn test_reason_codes() {
        let err = ReconcileError::Placement(SchedulerError::NoEligibleNodes);
        assert_eq!(err.reason_code(), "placement_failed");
        assert_eq!(
            err.to_string(),
            "failed to schedule QEMU instance: no eligible nodes available"
        );

        let err = ReconcileError::Options(OptionsError::TooManyDisks { count: 7, max: 6 });
        assert_eq!(err.reason_code(), "invalid_options");
    }
}
