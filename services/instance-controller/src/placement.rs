//! Scheduler interface.
//!
//! Placement (node, VM ID, storage) is decided outside this crate. The
//! reconciler hands the scheduler a provisional request plus the instance's
//! annotations and gets back a [`PlacementResult`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use capve_vm_options::ProvisionalRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a new VM goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementResult {
    pub node: String,
    pub vmid: u32,
    pub storage: String,
}

/// Instance annotations forwarded to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulingHints(BTreeMap<String, String>);

impl SchedulingHints {
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        Self(annotations.clone())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Errors that can occur during placement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("no eligible nodes available")]
    NoEligibleNodes,

    #[error("unschedulable: {0}")]
    Unschedulable(String),

    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Placement client.
#[async_trait]
pub trait PlacementClient: Send + Sync {
    /// Decide node, VM ID and storage for `request`.
    async fn place(
        &self,
        hints: &SchedulingHints,
        request: &ProvisionalRequest,
    ) -> Result<PlacementResult, SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_from_annotations() {
        let mut annotations = BTreeMap::new();
        annotations.insert("node-selector".to_string(), "pve1".to_string());

        let hints = SchedulingHints::from_annotations(&annotations);
        assert_eq!(hints.get("node-selector"), Some("pve1"));
        assert_eq!(hints.get("missing"), None);
        assert_ne!(hints, SchedulingHints::default());
    }
}
