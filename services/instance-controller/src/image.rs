//! Cloud image staging interface.

use async_trait::async_trait;
use capve_vm_options::ImageRef;

use crate::placement::PlacementResult;

/// Makes the OS image available on the placed node before the VM is created.
#[async_trait]
pub trait ImageStager: Send + Sync {
    async fn stage_image(&self, image: &ImageRef, placement: &PlacementResult)
        -> anyhow::Result<()>;
}
