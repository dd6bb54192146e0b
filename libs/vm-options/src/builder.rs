//! Option builder: desired spec to provisional create request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{warn, Span};

use crate::error::OptionsError;
use crate::request::{CreateRequest, ProvisionalRequest};
use crate::slots::{allocate_extra_disks, DiskSlots, MAX_EXTRA_DISKS};
use crate::spec::DesiredSpec;
use crate::wire;

/// What to do with extra disks beyond [`MAX_EXTRA_DISKS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Keep the first disks in declaration order and log a warning.
    #[default]
    Truncate,
    /// Fail the build.
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(Self::Truncate),
            "reject" => Ok(Self::Reject),
            other => Err(OptionsError::UnknownOverflowPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncate => f.write_str("truncate"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Builds provisional create requests.
///
/// Warnings are emitted inside the span handed to [`OptionBuilder::with_span`]
/// rather than whatever span happens to be current at call time.
#[derive(Debug, Clone)]
pub struct OptionBuilder {
    overflow: OverflowPolicy,
    span: Span,
}

impl Default for OptionBuilder {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}

impl OptionBuilder {
    pub fn new(overflow: OverflowPolicy) -> Self {
        Self {
            overflow,
            span: Span::none(),
        }
    }

    /// Log into `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Build the provisional request for `spec`.
    ///
    /// Storage-dependent fields use `spec.image_storage` until the storage
    /// injector replaces them. Fails when the image cannot be named, or when
    /// too many extra disks are declared under [`OverflowPolicy::Reject`].
    pub fn build(&self, spec: &DesiredSpec) -> Result<ProvisionalRequest, OptionsError> {
        if wire::raw_image_stem(&spec.image).is_none() {
            return Err(OptionsError::UnnamedImage {
                url: spec.image.url.clone(),
            });
        }

        let storage = spec.image_storage.as_str();
        let hardware = &spec.hardware;
        let network = &spec.network;
        let options = &spec.options;

        let allocation = allocate_extra_disks(&hardware.extra_disks);
        if allocation.is_truncated() {
            let count = hardware.extra_disks.len();
            match self.overflow {
                OverflowPolicy::Reject => {
                    return Err(OptionsError::TooManyDisks {
                        count,
                        max: MAX_EXTRA_DISKS,
                    });
                }
                OverflowPolicy::Truncate => {
                    self.span.in_scope(|| {
                        warn!(
                            vm_name = %spec.name,
                            declared = count,
                            max = MAX_EXTRA_DISKS,
                            dropped = allocation.dropped().len(),
                            "Too many extra disks, ignoring the excess"
                        )
                    });
                }
            }
        }

        let mut scsi = DiskSlots::new();
        scsi.set_root(wire::root_disk(storage, &spec.image));
        allocation.apply(&mut scsi);

        let request = CreateRequest {
            vmid: None,
            node: None,
            name: spec.name.clone(),
            acpi: wire::flag(options.acpi),
            agent: wire::AGENT.to_string(),
            arch: options.arch.map(|a| a.as_str().to_string()),
            balloon: options.balloon,
            bios: hardware.bios.to_string(),
            boot: wire::boot_order(),
            cicustom: wire::cloud_init_custom(&spec.snippet_storage, &spec.name),
            cores: hardware.cpu,
            cpu: hardware.cpu_type.clone(),
            cpulimit: hardware.cpu_limit,
            description: options.description.clone(),
            hugepages: options.hugepages.map(|h| h.as_str().to_string()),
            ide2: wire::cloud_init_drive(storage),
            ipconfig0: network.ip_config.to_string(),
            keephugepages: wire::flag(options.keep_hugepages),
            kvm: wire::flag(options.kvm),
            localtime: wire::flag(options.local_time),
            lock: options.lock.map(|l| l.as_str().to_string()),
            memory: hardware.memory,
            nameserver: network.name_server.clone(),
            net0: hardware.network_device.to_string(),
            numa: wire::flag(options.numa),
            onboot: wire::flag(options.on_boot),
            ostype: options.os_type.map(|o| o.as_str().to_string()),
            protection: wire::flag(options.protection),
            reboot: wire::flag(options.reboot),
            scsi,
            scsihw: wire::SCSI_HARDWARE.to_string(),
            searchdomain: network.search_domain.clone(),
            serial0: wire::SERIAL_SOCKET.to_string(),
            shares: options.shares,
            sockets: hardware.sockets,
            storage: storage.to_string(),
            tablet: wire::flag(options.tablet),
            tags: options.tags.to_string(),
            tdf: wire::flag(options.time_drift_fix),
            template: wire::flag(options.template),
            vcpus: options.vcpus,
            vga: wire::VGA_SERIAL.to_string(),
            vmgenid: options.vm_generation_id.clone(),
        };

        Ok(ProvisionalRequest(request))
    }
}
