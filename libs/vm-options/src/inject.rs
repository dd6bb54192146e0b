//! Storage injection once placement is decided.

use crate::request::{FinalRequest, Injectable};
use crate::slots::allocate_extra_disks;
use crate::spec::{DesiredSpec, ExtraDisk, ImageRef};
use crate::wire;

/// Rewrites every storage-dependent field of a request.
///
/// The root disk, the cloud-init drive and the top-level storage field take
/// the placement's storage. Extra disks keep their own declared pool.
#[derive(Debug, Clone, Copy)]
pub struct StorageInjector<'a> {
    image: &'a ImageRef,
    extra_disks: &'a [ExtraDisk],
}

impl<'a> StorageInjector<'a> {
    pub fn new(image: &'a ImageRef, extra_disks: &'a [ExtraDisk]) -> Self {
        Self { image, extra_disks }
    }

    pub fn for_spec(spec: &'a DesiredSpec) -> Self {
        Self::new(&spec.image, &spec.hardware.extra_disks)
    }

    /// Apply `storage` to `request`. Applying the same storage twice yields
    /// the same request.
    pub fn inject<R: Injectable>(&self, request: R, storage: &str) -> FinalRequest {
        let mut request = request.into_request();

        request.storage = storage.to_string();
        request.ide2 = wire::cloud_init_drive(storage);

        request.scsi.set_root(wire::root_disk(storage, self.image));
        allocate_extra_disks(self.extra_disks).apply(&mut request.scsi);

        FinalRequest(request)
    }
}
