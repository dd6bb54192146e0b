//! In-memory collaborators for development and testing.
//!
//! These stand in for the platform API, the scheduler and the image stager
//! so the reconciler can run without a cluster. Each one counts its calls and
//! can be configured to fail.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use capve_vm_options::{CreateRequest, FinalRequest, ImageRef, ProvisionalRequest};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::identity::{IdentityStore, InstanceIdentity};
use crate::image::ImageStager;
use crate::placement::{PlacementClient, PlacementResult, SchedulerError, SchedulingHints};
use crate::platform::{PlatformError, VirtualMachine, VirtualMachineApi};

/// A create call recorded by [`InMemoryPlatform`].
#[derive(Debug, Clone)]
pub struct CreateRecord {
    pub node: String,
    pub vmid: u32,
    pub request: CreateRequest,
}

/// In-memory platform.
#[derive(Default)]
pub struct InMemoryPlatform {
    vms: RwLock<BTreeMap<u32, VirtualMachine>>,
    created: RwLock<Vec<CreateRecord>>,
    lookup_failure: Option<PlatformError>,
    exists_failure: Option<PlatformError>,
    create_failure: Option<PlatformError>,
    lookup_calls: AtomicU64,
    exists_calls: AtomicU64,
    create_calls: AtomicU64,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing VM.
    pub fn with_vm(mut self, vm: VirtualMachine) -> Self {
        self.vms.get_mut().insert(vm.vmid, vm);
        self
    }

    /// Fail every lookup by ID with `err`.
    pub fn failing_lookups(mut self, err: PlatformError) -> Self {
        self.lookup_failure = Some(err);
        self
    }

    /// Fail every existence check with `err`.
    pub fn failing_exists(mut self, err: PlatformError) -> Self {
        self.exists_failure = Some(err);
        self
    }

    /// Fail every create with `err`.
    pub fn failing_creates(mut self, err: PlatformError) -> Self {
        self.create_failure = Some(err);
        self
    }

    pub fn lookup_calls(&self) -> u64 {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> u64 {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u64 {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Requests accepted by create, in call order.
    pub async fn created(&self) -> Vec<CreateRecord> {
        self.created.read().await.clone()
    }

    pub async fn vm_count(&self) -> usize {
        self.vms.read().await.len()
    }
}

#[async_trait]
impl VirtualMachineApi for InMemoryPlatform {
    async fn virtual_machine(&self, vmid: u32) -> Result<VirtualMachine, PlatformError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.lookup_failure {
            return Err(err.clone());
        }

        self.vms
            .read()
            .await
            .get(&vmid)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("vmid {vmid}")))
    }

    async fn virtual_machine_exists_with_name(&self, name: &str) -> Result<bool, PlatformError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.exists_failure {
            return Err(err.clone());
        }

        Ok(self.vms.read().await.values().any(|vm| vm.name == name))
    }

    async fn create_virtual_machine(
        &self,
        node: &str,
        vmid: u32,
        request: &FinalRequest,
    ) -> Result<VirtualMachine, PlatformError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.create_failure {
            return Err(err.clone());
        }

        let mut vms = self.vms.write().await;
        if vms.contains_key(&vmid) {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("VM {vmid} already exists"),
            });
        }

        let request = request.request().clone();
        info!(
            node = %node,
            vmid,
            name = %request.name,
            storage = %request.storage,
            "[MOCK] Creating QEMU"
        );

        let vm = VirtualMachine {
            vmid,
            node: node.to_string(),
            name: request.name.clone(),
        };
        vms.insert(vmid, vm.clone());
        self.created.write().await.push(CreateRecord {
            node: node.to_string(),
            vmid,
            request,
        });

        Ok(vm)
    }
}

/// What [`StaticPlacement`] was asked to place.
#[derive(Debug, Clone)]
pub struct PlacementCall {
    pub hints: SchedulingHints,
    pub placeholder_storage: String,
}

/// Scheduler that always picks the same node and storage, handing out VM IDs
/// sequentially.
pub struct StaticPlacement {
    node: String,
    storage: String,
    next_vmid: AtomicU32,
    failure: Option<SchedulerError>,
    calls: Mutex<Vec<PlacementCall>>,
}

impl StaticPlacement {
    pub fn new(node: impl Into<String>, storage: impl Into<String>, first_vmid: u32) -> Self {
        Self {
            node: node.into(),
            storage: storage.into(),
            next_vmid: AtomicU32::new(first_vmid),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every placement with `err`.
    pub fn failing(mut self, err: SchedulerError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<PlacementCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl PlacementClient for StaticPlacement {
    async fn place(
        &self,
        hints: &SchedulingHints,
        request: &ProvisionalRequest,
    ) -> Result<PlacementResult, SchedulerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PlacementCall {
                hints: hints.clone(),
                placeholder_storage: request.placeholder_storage().to_string(),
            });
        }

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let vmid = self.next_vmid.fetch_add(1, Ordering::SeqCst);
        debug!(node = %self.node, vmid, storage = %self.storage, "[MOCK] Placed QEMU");

        Ok(PlacementResult {
            node: self.node.clone(),
            vmid,
            storage: self.storage.clone(),
        })
    }
}

/// Image stager that does nothing.
#[derive(Default)]
pub struct NoopImageStager {
    calls: AtomicU64,
    fail: bool,
    delay: Option<Duration>,
}

impl NoopImageStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stager that fails every call.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Create a stager that takes `delay` to stage each image.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStager for NoopImageStager {
    async fn stage_image(
        &self,
        image: &ImageRef,
        placement: &PlacementResult,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("Mock image stager configured to fail");
        }

        debug!(url = %image.url, node = %placement.node, "[MOCK] Staged cloud image");
        Ok(())
    }
}

/// Identity store held in memory.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    records: Mutex<BTreeMap<String, InstanceIdentity>>,
    persist_calls: AtomicU64,
    fail: bool,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose writes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn persist_calls(&self) -> u64 {
        self.persist_calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, instance: &str) -> Option<InstanceIdentity> {
        self.records.lock().ok()?.get(instance).cloned()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn load(&self, instance: &str) -> anyhow::Result<InstanceIdentity> {
        Ok(self.get(instance).unwrap_or_default())
    }

    async fn persist(&self, instance: &str, identity: &InstanceIdentity) -> anyhow::Result<()> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("Mock identity store configured to fail");
        }

        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("identity store lock poisoned"))?
            .insert(instance.to_string(), identity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_platform_lookup_not_found() {
        let platform = InMemoryPlatform::new();
        let err = platform.virtual_machine(100).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(platform.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_platform_exists_by_name() {
        let platform = InMemoryPlatform::new().with_vm(VirtualMachine {
            vmid: 100,
            node: "pve1".to_string(),
            name: "vm-a".to_string(),
        });
        assert!(platform.virtual_machine_exists_with_name("vm-a").await.unwrap());
        assert!(!platform.virtual_machine_exists_with_name("vm-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_static_placement_sequential_vmids() {
        let placement = StaticPlacement::new("pve1", "fast-pool", 100);
        let spec: capve_vm_options::DesiredSpec = serde_json::from_value(serde_json::json!({
            "name": "vm-a",
            "image": { "url": "https://example.com/jammy.img" },
            "snippet_storage": "snippets",
            "image_storage": "images",
        }))
        .unwrap();
        let request = capve_vm_options::OptionBuilder::default().build(&spec).unwrap();
        let hints = SchedulingHints::default();

        let first = placement.place(&hints, &request).await.unwrap();
        let second = placement.place(&hints, &request).await.unwrap();
        assert_eq!((first.vmid, second.vmid), (100, 101));
        assert_eq!(placement.call_count(), 2);
        assert_eq!(placement.calls()[0].placeholder_storage, "images");
    }

    #[tokio::test]
    async fn test_identity_store_failing() {
        let store = InMemoryIdentityStore::failing();
        assert!(store
            .persist("vm-a", &InstanceIdentity::default())
            .await
            .is_err());
        assert_eq!(store.persist_calls(), 1);
        assert!(store.get("vm-a").is_none());
    }
}
