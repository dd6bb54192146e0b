//! Wire-string rendering for the platform create request.
//!
//! Every string the platform parses positionally is produced here so the
//! builder and the storage injector cannot drift apart.

use crate::slots::ROOT_DISK_SLOT;
use crate::spec::ImageRef;

/// Device the VM boots from.
pub const BOOT_DEVICE: &str = "scsi0";

/// SCSI controller model.
pub const SCSI_HARDWARE: &str = "virtio-scsi-pci";

/// QEMU guest agent setting.
pub const AGENT: &str = "enabled=1";

/// Serial console backing `serial0`.
pub const SERIAL_SOCKET: &str = "socket";

/// Display routed to the serial console.
pub const VGA_SERIAL: &str = "serial0";

/// Directory on each node holding raw images staged for import.
pub const RAW_IMAGE_DIR: &str = "/var/lib/capve/images";

/// `order=<device>` boot string.
pub fn boot_order() -> String {
    format!("order={BOOT_DEVICE}")
}

/// Root disk imported from a staged image.
pub fn root_disk(storage: &str, image: &ImageRef) -> String {
    format!(
        "{storage}:{ROOT_DISK_SLOT},import-from={}",
        raw_image_file_path(image)
    )
}

/// Empty data disk allocated on `storage`.
pub fn extra_disk(storage: &str, slot: usize, size: &str) -> String {
    format!("{storage}:{slot},size={size}")
}

/// Cloud-init drive attached as a CD-ROM.
pub fn cloud_init_drive(storage: &str) -> String {
    format!("file={storage}:cloudinit,media=cdrom")
}

/// Custom cloud-init user-data reference.
pub fn cloud_init_custom(snippet_storage: &str, vm_name: &str) -> String {
    format!("user={snippet_storage}:{}", user_snippet_path(vm_name))
}

/// Path of the user-data snippet inside the snippet storage.
pub fn user_snippet_path(vm_name: &str) -> String {
    format!("snippets/{vm_name}-user.yml")
}

/// File stem of the raw image on the node.
///
/// Images with a checksum are keyed by it so two URLs serving the same
/// content share one file. Returns `None` when neither the checksum nor the
/// URL's last path segment yields a name.
pub fn raw_image_stem(image: &ImageRef) -> Option<String> {
    let stem = match image.checksum.as_deref().filter(|c| !c.is_empty()) {
        Some(checksum) => checksum.to_string(),
        None => url_stem(&image.url),
    };
    (!stem.is_empty()).then_some(stem)
}

/// Absolute path of the raw image on the node.
///
/// Callers validate the image with [`raw_image_stem`] first; an unnamed
/// image renders as `<dir>/.raw`.
pub fn raw_image_file_path(image: &ImageRef) -> String {
    let stem = raw_image_stem(image).unwrap_or_default();
    format!("{RAW_IMAGE_DIR}/{stem}.raw")
}

fn url_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

/// Platform boolean.
pub fn flag(value: bool) -> u8 {
    u8::from(value)
}
