//! SCSI disk slot table and extra-disk allocation.
//!
//! The platform addresses disks positionally (`scsi0` .. `scsi6`). Slot 0 is
//! the root disk; extra disks take slots 1 and up in declaration order.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::OptionsError;
use crate::spec::ExtraDisk;

/// Slot holding the root disk.
pub const ROOT_DISK_SLOT: usize = 0;

/// Number of extra disks that fit next to the root disk.
pub const MAX_EXTRA_DISKS: usize = 6;

/// Total SCSI slots in the table.
pub const SCSI_SLOT_COUNT: usize = MAX_EXTRA_DISKS + 1;

/// Fixed table of SCSI slots indexed by slot number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskSlots([Option<String>; SCSI_SLOT_COUNT]);

impl DiskSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a slot.
    pub fn set(&mut self, slot: usize, value: String) -> Result<(), OptionsError> {
        let entry = self.0.get_mut(slot).ok_or(OptionsError::SlotOutOfRange {
            slot,
            max: SCSI_SLOT_COUNT - 1,
        })?;
        *entry = Some(value);
        Ok(())
    }

    /// Set the root disk.
    pub fn set_root(&mut self, value: String) {
        self.0[ROOT_DISK_SLOT] = Some(value);
    }

    pub fn get(&self, slot: usize) -> Option<&str> {
        self.0.get(slot).and_then(|v| v.as_deref())
    }

    pub fn root(&self) -> Option<&str> {
        self.get(ROOT_DISK_SLOT)
    }

    /// Empty every slot except the root disk.
    pub fn clear_extra(&mut self) {
        for entry in self.0.iter_mut().skip(ROOT_DISK_SLOT + 1) {
            *entry = None;
        }
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(slot, v)| v.as_deref().map(|v| (slot, v)))
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }
}

/// Serialized as flat `scsiN` keys, omitting empty slots.
impl Serialize for DiskSlots {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.occupied()))?;
        for (slot, value) in self.iter() {
            map.serialize_entry(&format!("scsi{slot}"), value)?;
        }
        map.end()
    }
}

/// Slot number for the extra disk at `position` in the declared list.
pub fn extra_disk_slot(position: usize) -> usize {
    ROOT_DISK_SLOT + 1 + position
}

/// Result of mapping declared extra disks onto slots.
#[derive(Debug, Clone, Copy)]
pub struct SlotAllocation<'a> {
    assigned: &'a [ExtraDisk],
    dropped: &'a [ExtraDisk],
}

impl<'a> SlotAllocation<'a> {
    /// `(slot, disk)` pairs in declaration order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, &'a ExtraDisk)> {
        self.assigned
            .iter()
            .enumerate()
            .map(|(position, disk)| (extra_disk_slot(position), disk))
    }

    /// Disks beyond the slot capacity.
    pub fn dropped(&self) -> &'a [ExtraDisk] {
        self.dropped
    }

    pub fn is_truncated(&self) -> bool {
        !self.dropped.is_empty()
    }

    /// Write every assigned disk into `table`, clearing stale extra slots.
    pub fn apply(&self, table: &mut DiskSlots) {
        table.clear_extra();
        let extra = table.0.iter_mut().skip(ROOT_DISK_SLOT + 1);
        for (entry, (slot, disk)) in extra.zip(self.slots()) {
            *entry = Some(crate::wire::extra_disk(&disk.storage, slot, &disk.size));
        }
    }
}

/// Assign extra disks to slots 1..=[`MAX_EXTRA_DISKS`] by position.
///
/// Disks past the capacity are reported in [`SlotAllocation::dropped`]; the
/// caller decides whether that is an error.
pub fn allocate_extra_disks(disks: &[ExtraDisk]) -> SlotAllocation<'_> {
    let (assigned, dropped) = disks.split_at(disks.len().min(MAX_EXTRA_DISKS));
    SlotAllocation { assigned, dropped }
}
