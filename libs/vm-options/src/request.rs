//! Platform create request and its two build phases.
//!
//! A request starts as a [`ProvisionalRequest`] whose storage fields carry a
//! placeholder. Only the storage injector turns it into a [`FinalRequest`],
//! which is the only form the platform create call accepts.

use serde::Serialize;

use crate::slots::DiskSlots;

/// Flat create request, serialized with the platform's parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub name: String,

    pub acpi: u8,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balloon: Option<u32>,
    pub bios: String,
    pub boot: String,
    pub cicustom: String,
    pub cores: u32,
    pub cpu: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpulimit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<String>,
    pub ide2: String,
    pub ipconfig0: String,
    pub keephugepages: u8,
    pub kvm: u8,
    pub localtime: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
    pub memory: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    pub net0: String,
    pub numa: u8,
    pub onboot: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    pub protection: u8,
    pub reboot: u8,
    #[serde(flatten)]
    pub scsi: DiskSlots,
    pub scsihw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchdomain: Option<String>,
    pub serial0: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<u32>,
    pub sockets: u32,
    pub storage: String,
    pub tablet: u8,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tags: String,
    pub tdf: u8,
    pub template: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    pub vga: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmgenid: Option<String>,
}

/// Request built before placement. Storage fields hold a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalRequest(pub(crate) CreateRequest);

impl ProvisionalRequest {
    pub fn request(&self) -> &CreateRequest {
        &self.0
    }

    /// The storage value used before placement was known.
    pub fn placeholder_storage(&self) -> &str {
        &self.0.storage
    }
}

/// Request with placement-dependent storage applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRequest(pub(crate) CreateRequest);

impl FinalRequest {
    pub fn request(&self) -> &CreateRequest {
        &self.0
    }

    pub fn storage(&self) -> &str {
        &self.0.storage
    }

    pub fn into_inner(self) -> CreateRequest {
        self.0
    }
}

/// Either phase of a request, as accepted by the storage injector.
pub trait Injectable {
    fn into_request(self) -> CreateRequest;
}

impl Injectable for CreateRequest {
    fn into_request(self) -> CreateRequest {
        self
    }
}

impl Injectable for ProvisionalRequest {
    fn into_request(self) -> CreateRequest {
        self.0
    }
}

impl Injectable for FinalRequest {
    fn into_request(self) -> CreateRequest {
        self.0
    }
}
