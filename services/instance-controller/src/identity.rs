//! Instance identity record and its persistence interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::platform::VirtualMachine;

/// The minimal persisted state used to recognize a provisioned instance.
///
/// `vmid` is set only once a VM has been confirmed to exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub vmid: Option<u32>,
    pub node: String,
    pub storage: String,
}

impl InstanceIdentity {
    /// Returns true if a VM has been confirmed for this instance.
    pub fn is_provisioned(&self) -> bool {
        self.vmid.is_some()
    }

    /// Identity refreshed from a live VM. Storage is kept.
    pub fn refreshed(&self, vm: &VirtualMachine) -> Self {
        Self {
            vmid: Some(vm.vmid),
            node: vm.node.clone(),
            storage: self.storage.clone(),
        }
    }
}

/// Durable storage for identity records, keyed by instance name.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load the identity of `instance`, or an empty identity if none exists.
    async fn load(&self, instance: &str) -> anyhow::Result<InstanceIdentity>;

    /// Persist the identity of `instance`.
    async fn persist(&self, instance: &str, identity: &InstanceIdentity) -> anyhow::Result<()>;
}
