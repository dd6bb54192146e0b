//! Virtualization platform interface.
//!
//! The reconciler only needs three calls from the platform: lookup by VM ID,
//! existence by name, and create. Transport and authentication live behind
//! this trait.

use async_trait::async_trait;
use capve_vm_options::FinalRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A QEMU VM as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub vmid: u32,
    /// Node the VM lives on.
    pub node: String,
    pub name: String,
}

/// Errors returned by the platform.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The requested VM does not exist.
    #[error("virtual machine not found: {0}")]
    NotFound(String),

    /// The platform rejected the call.
    #[error("platform API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The platform could not be reached.
    #[error("platform unreachable: {0}")]
    Transport(String),
}

impl PlatformError {
    /// Returns true if this error means the VM is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }
}

/// Platform operations used by the reconciler.
#[async_trait]
pub trait VirtualMachineApi: Send + Sync {
    /// Fetch a VM by ID. Absent VMs yield [`PlatformError::NotFound`].
    async fn virtual_machine(&self, vmid: u32) -> Result<VirtualMachine, PlatformError>;

    /// Whether any VM in the cluster carries `name`.
    async fn virtual_machine_exists_with_name(&self, name: &str) -> Result<bool, PlatformError>;

    /// Create a VM on `node` with ID `vmid`.
    async fn create_virtual_machine(
        &self,
        node: &str,
        vmid: u32,
        request: &FinalRequest,
    ) -> Result<VirtualMachine, PlatformError>;
}
