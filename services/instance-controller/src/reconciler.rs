//! Instance reconciler.
//!
//! Converges one logical instance to exactly one QEMU VM:
//!
//! ```text
//! identity.vmid set? ──yes──> lookup ──found──> Existing
//!        │                      │
//!        no                 not found
//!        └──────────┬───────────┘
//!                   v
//!        VM with same name? ──yes/unknown──> DuplicateInstance
//!                   │
//!                   no
//!                   v
//!   build ─> place ─> inject storage ─> stage image ─> create ─> Created
//! ```
//!
//! Both terminal states persist the identity before returning.

use std::sync::Arc;

use capve_vm_options::{DesiredSpec, OptionBuilder, StorageInjector};
use tracing::{debug, error, info, instrument};

use crate::error::{ReconcileError, ReconcileResult};
use crate::identity::{IdentityStore, InstanceIdentity};
use crate::image::ImageStager;
use crate::placement::{PlacementClient, PlacementResult, SchedulingHints};
use crate::platform::{VirtualMachine, VirtualMachineApi};

/// How a pass converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The recorded VM was found.
    Existing,
    /// A new VM was provisioned.
    Created,
}

/// Result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Identity as persisted at the end of the pass.
    pub identity: InstanceIdentity,
    pub action: ReconcileAction,
}

/// Reconciles QEMU instances against the platform.
pub struct InstanceReconciler {
    platform: Arc<dyn VirtualMachineApi>,
    placement: Arc<dyn PlacementClient>,
    images: Arc<dyn ImageStager>,
    identities: Arc<dyn IdentityStore>,
    builder: OptionBuilder,
}

impl InstanceReconciler {
    /// Create a new reconciler with the default option builder.
    pub fn new(
        platform: Arc<dyn VirtualMachineApi>,
        placement: Arc<dyn PlacementClient>,
        images: Arc<dyn ImageStager>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            platform,
            placement,
            images,
            identities,
            builder: OptionBuilder::default(),
        }
    }

    /// Replace the option builder (overflow policy, log span).
    pub fn with_option_builder(mut self, builder: OptionBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Run one reconciliation pass for `spec`.
    ///
    /// `identity` is the record persisted by the previous pass.
    #[instrument(skip_all, fields(vm_name = %spec.name, vmid = ?identity.vmid))]
    pub async fn reconcile(
        &self,
        spec: &DesiredSpec,
        identity: InstanceIdentity,
    ) -> ReconcileResult<ReconcileOutcome> {
        info!("Reconciling QEMU");

        let (identity, action) = match self.lookup(&identity).await? {
            Some(vm) => {
                debug!(vmid = vm.vmid, node = %vm.node, "QEMU found");
                (identity.refreshed(&vm), ReconcileAction::Existing)
            }
            None => {
                debug!("QEMU wasn't found, creating new QEMU");
                self.ensure_not_duplicate(&spec.name).await?;

                let (placement, vm) = self.create(spec).await.inspect_err(|e| {
                    error!(error = %e, "Failed to create QEMU");
                })?;

                let identity = InstanceIdentity {
                    vmid: Some(vm.vmid),
                    node: vm.node,
                    storage: placement.storage,
                };
                (identity, ReconcileAction::Created)
            }
        };

        self.identities
            .persist(&spec.name, &identity)
            .await
            .map_err(|e| {
                error!(error = %e, vmid = ?identity.vmid, "Failed to persist instance identity");
                ReconcileError::Persistence(e)
            })?;

        info!(
            vmid = ?identity.vmid,
            node = %identity.node,
            storage = %identity.storage,
            action = ?action,
            "QEMU reconciled"
        );

        Ok(ReconcileOutcome { identity, action })
    }

    /// Look up the recorded VM. `None` means creation should proceed.
    async fn lookup(&self, identity: &InstanceIdentity) -> ReconcileResult<Option<VirtualMachine>> {
        let Some(vmid) = identity.vmid else {
            return Ok(None);
        };

        debug!(vmid, "Fetching QEMU from VM ID");
        match self.platform.virtual_machine(vmid).await {
            Ok(vm) => Ok(Some(vm)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                error!(vmid, error = %e, "Failed to get QEMU");
                Err(ReconcileError::Lookup { vmid, source: e })
            }
        }
    }

    /// Refuse to create when a VM with the same name exists or cannot be
    /// ruled out.
    async fn ensure_not_duplicate(&self, name: &str) -> ReconcileResult<()> {
        let source = match self.platform.virtual_machine_exists_with_name(name).await {
            Ok(false) => return Ok(()),
            Ok(true) => None,
            Err(e) => Some(e),
        };

        error!(
            error = source.as_ref().map(tracing::field::display),
            "Stopping QEMU creation to avoid duplicate instances"
        );
        Err(ReconcileError::DuplicateInstance {
            name: name.to_string(),
            source,
        })
    }

    /// Provision a new VM for `spec`.
    ///
    /// The provisional request carries the spec's image storage; everything
    /// storage-dependent is rewritten from the placement before creation.
    #[instrument(skip_all, fields(vm_name = %spec.name))]
    pub async fn create(
        &self,
        spec: &DesiredSpec,
    ) -> ReconcileResult<(PlacementResult, VirtualMachine)> {
        info!("Creating QEMU instance");

        let provisional = self.builder.build(spec)?;

        let hints = SchedulingHints::from_annotations(&spec.annotations);
        let placement = self
            .placement
            .place(&hints, &provisional)
            .await
            .map_err(ReconcileError::Placement)?;
        debug!(
            node = %placement.node,
            vmid = placement.vmid,
            storage = %placement.storage,
            "QEMU scheduled"
        );

        let request = StorageInjector::for_spec(spec).inject(provisional, &placement.storage);

        self.images
            .stage_image(&spec.image, &placement)
            .await
            .map_err(ReconcileError::ImageStaging)?;

        let vm = self
            .platform
            .create_virtual_machine(&placement.node, placement.vmid, &request)
            .await
            .map_err(|source| ReconcileError::Create {
                node: placement.node.clone(),
                vmid: placement.vmid,
                source,
            })?;

        info!(vmid = vm.vmid, node = %vm.node, "QEMU created");
        Ok((placement, vm))
    }
}
