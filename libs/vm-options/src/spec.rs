//! Desired-state description of a single QEMU instance.
//!
//! These types are the input of one reconciliation pass. They are loaded from
//! JSON (missing fields fall back to the defaults below) and are never mutated
//! while a request is being built.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Complete desired state for one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredSpec {
    /// VM name. Unique per cluster; used by the duplicate guard.
    pub name: String,

    #[serde(default)]
    pub hardware: Hardware,

    #[serde(default)]
    pub network: Network,

    #[serde(default)]
    pub options: Options,

    /// OS image the root disk is imported from.
    pub image: ImageRef,

    /// Cluster storage holding cloud-init snippets.
    pub snippet_storage: String,

    /// Storage pre-declared for images. Used as the placeholder storage of
    /// the provisional request.
    pub image_storage: String,

    /// Instance annotations, forwarded to the scheduler as hints.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Virtual hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// CPU cores per socket.
    pub cpu: u32,
    pub sockets: u32,
    /// Emulated CPU type (`host`, `kvm64`, ...).
    pub cpu_type: String,
    /// CPU usage limit. `None` means unlimited.
    pub cpu_limit: Option<u32>,
    /// Memory in MiB.
    pub memory: u32,
    pub bios: Bios,
    pub network_device: NetworkDevice,
    /// Additional SCSI disks. Order determines the slot.
    pub extra_disks: Vec<ExtraDisk>,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            cpu: 2,
            sockets: 1,
            cpu_type: "host".to_string(),
            cpu_limit: None,
            memory: 4096,
            bios: Bios::default(),
            network_device: NetworkDevice::default(),
            extra_disks: Vec::new(),
        }
    }
}

/// Firmware variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bios {
    #[default]
    Seabios,
    Ovmf,
}

impl Bios {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bios::Seabios => "seabios",
            Bios::Ovmf => "ovmf",
        }
    }
}

impl fmt::Display for Bios {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extra data disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDisk {
    /// Storage pool the disk is allocated on. May differ from the root disk's.
    pub storage: String,
    /// Size specifier as understood by the platform (`10G`, `512M`).
    pub size: String,
}

impl ExtraDisk {
    pub fn new(storage: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            size: size.into(),
        }
    }
}

/// NIC model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkModel {
    #[default]
    Virtio,
    E1000,
    Rtl8139,
    Vmxnet3,
}

impl NetworkModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkModel::Virtio => "virtio",
            NetworkModel::E1000 => "e1000",
            NetworkModel::Rtl8139 => "rtl8139",
            NetworkModel::Vmxnet3 => "vmxnet3",
        }
    }
}

/// The single network interface attached at `net0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDevice {
    pub model: NetworkModel,
    /// Host bridge the interface is plugged into.
    pub bridge: String,
    pub firewall: bool,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    /// Multiqueue count (virtio only).
    pub queues: Option<u32>,
    /// VLAN tag.
    pub tag: Option<u32>,
    pub link_down: bool,
}

impl Default for NetworkDevice {
    fn default() -> Self {
        Self {
            model: NetworkModel::default(),
            bridge: "vmbr0".to_string(),
            firewall: true,
            mac_address: None,
            mtu: None,
            queues: None,
            tag: None,
            link_down: false,
        }
    }
}

impl fmt::Display for NetworkDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={},bridge={},firewall={}",
            self.model.as_str(),
            self.bridge,
            u8::from(self.firewall)
        )?;
        if let Some(mac) = &self.mac_address {
            write!(f, ",macaddr={mac}")?;
        }
        if let Some(mtu) = self.mtu {
            write!(f, ",mtu={mtu}")?;
        }
        if let Some(queues) = self.queues {
            write!(f, ",queues={queues}")?;
        }
        if let Some(tag) = self.tag {
            write!(f, ",tag={tag}")?;
        }
        if self.link_down {
            f.write_str(",link_down=1")?;
        }
        Ok(())
    }
}

/// Guest networking handed to cloud-init.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Network {
    pub ip_config: IpConfig,
    pub name_server: Option<String>,
    pub search_domain: Option<String>,
}

/// Addressing for `ipconfig0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpConfig {
    /// IPv4 CIDR or `dhcp`.
    pub ip: Option<String>,
    pub gateway: Option<String>,
    /// IPv6 CIDR, `dhcp` or `auto`.
    pub ip6: Option<String>,
    pub gateway6: Option<String>,
}

impl fmt::Display for IpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            ("ip", &self.ip),
            ("gw", &self.gateway),
            ("ip6", &self.ip6),
            ("gw6", &self.gateway6),
        ];
        let mut first = true;
        for (key, value) in parts {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Platform options that are not hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub acpi: bool,
    pub arch: Option<Arch>,
    /// Balloon target in MiB. `0` disables the balloon device.
    pub balloon: Option<u32>,
    pub description: Option<String>,
    pub hugepages: Option<HugePages>,
    pub keep_hugepages: bool,
    pub kvm: bool,
    pub local_time: bool,
    pub lock: Option<Lock>,
    pub numa: bool,
    /// Start the VM when the host boots.
    pub on_boot: bool,
    pub os_type: Option<OsType>,
    pub protection: bool,
    pub reboot: bool,
    pub shares: Option<u32>,
    pub tablet: bool,
    pub tags: Tags,
    pub time_drift_fix: bool,
    pub template: bool,
    pub vcpus: Option<u32>,
    pub vm_generation_id: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            acpi: true,
            arch: None,
            balloon: None,
            description: None,
            hugepages: None,
            keep_hugepages: false,
            kvm: true,
            local_time: false,
            lock: None,
            numa: false,
            on_boot: false,
            os_type: None,
            protection: false,
            reboot: true,
            shares: None,
            tablet: true,
            tags: Tags::default(),
            time_drift_fix: false,
            template: false,
            vcpus: None,
            vm_generation_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HugePages {
    Any,
    #[serde(rename = "2")]
    Size2,
    #[serde(rename = "1024")]
    Size1024,
}

impl HugePages {
    pub fn as_str(&self) -> &'static str {
        match self {
            HugePages::Any => "any",
            HugePages::Size2 => "2",
            HugePages::Size1024 => "1024",
        }
    }
}

/// Platform lock held on the VM config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lock {
    Backup,
    Clone,
    Create,
    Migrate,
    Rollback,
    Snapshot,
    SnapshotDelete,
    Suspending,
    Suspended,
}

impl Lock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lock::Backup => "backup",
            Lock::Clone => "clone",
            Lock::Create => "create",
            Lock::Migrate => "migrate",
            Lock::Rollback => "rollback",
            Lock::Snapshot => "snapshot",
            Lock::SnapshotDelete => "snapshot-delete",
            Lock::Suspending => "suspending",
            Lock::Suspended => "suspended",
        }
    }
}

/// Guest OS hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Other,
    Wxp,
    W2k,
    W2k3,
    W2k8,
    Wvista,
    Win7,
    Win8,
    Win10,
    Win11,
    L24,
    L26,
    Solaris,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Other => "other",
            OsType::Wxp => "wxp",
            OsType::W2k => "w2k",
            OsType::W2k3 => "w2k3",
            OsType::W2k8 => "w2k8",
            OsType::Wvista => "wvista",
            OsType::Win7 => "win7",
            OsType::Win8 => "win8",
            OsType::Win10 => "win10",
            OsType::Win11 => "win11",
            OsType::L24 => "l24",
            OsType::L26 => "l26",
            OsType::Solaris => "solaris",
        }
    }
}

/// VM tags. Rendered `;`-separated on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(";"))
    }
}

/// Checksum algorithm of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumType {
    Sha256,
    Md5,
}

/// Reference to a cloud image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub checksum_type: Option<ChecksumType>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            checksum: None,
            checksum_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_device_minimal() {
        let dev = NetworkDevice::default();
        assert_eq!(dev.to_string(), "model=virtio,bridge=vmbr0,firewall=1");
    }

    #[test]
    fn test_network_device_full() {
        let dev = NetworkDevice {
            model: NetworkModel::E1000,
            bridge: "vmbr1".to_string(),
            firewall: false,
            mac_address: Some("bc:24:11:00:00:01".to_string()),
            mtu: Some(9000),
            queues: Some(4),
            tag: Some(42),
            link_down: true,
        };
        assert_eq!(
            dev.to_string(),
            "model=e1000,bridge=vmbr1,firewall=0,macaddr=bc:24:11:00:00:01,mtu=9000,queues=4,tag=42,link_down=1"
        );
    }

    #[test]
    fn test_ip_config_skips_empty_parts() {
        let cfg = IpConfig {
            ip: Some("10.0.0.5/24".to_string()),
            gateway: Some("10.0.0.1".to_string()),
            ip6: Some(String::new()),
            gateway6: None,
        };
        assert_eq!(cfg.to_string(), "ip=10.0.0.5/24,gw=10.0.0.1");

        let v6_only = IpConfig {
            ip6: Some("auto".to_string()),
            ..Default::default()
        };
        assert_eq!(v6_only.to_string(), "ip6=auto");
        assert_eq!(IpConfig::default().to_string(), "");
    }

    #[test]
    fn test_tags_joined() {
        let tags = Tags(vec!["k8s".to_string(), "worker".to_string()]);
        assert_eq!(tags.to_string(), "k8s;worker");
    }

    #[test]
    fn test_spec_defaults_from_json() {
        let spec: DesiredSpec = serde_json::from_value(serde_json::json!({
            "name": "vm-a",
            "image": { "url": "https://example.com/jammy.img" },
            "snippet_storage": "snippets",
            "image_storage": "images",
            "hardware": { "cpu": 4, "extra_disks": [{ "storage": "local", "size": "10G" }] },
            "options": { "lock": "snapshot-delete", "hugepages": "1024" }
        }))
        .unwrap();

        assert_eq!(spec.hardware.cpu, 4);
        assert_eq!(spec.hardware.sockets, 1);
        assert_eq!(spec.hardware.memory, 4096);
        assert_eq!(spec.hardware.extra_disks, vec![ExtraDisk::new("local", "10G")]);
        assert!(spec.options.acpi);
        assert_eq!(spec.options.lock, Some(Lock::SnapshotDelete));
        assert_eq!(spec.options.hugepages, Some(HugePages::Size1024));
        assert!(spec.annotations.is_empty());
    }
}
