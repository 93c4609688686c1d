// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory model of one machine's block-storage state.  The
//! applier writes the objects a deployment would create into this
//! model; callers read it back out to drive the actual provisioning.

use crate::entries::CacheMode;
use crate::entries::FsType;
use crate::entries::PTableType;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// A real disk the machine reported during enlistment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDisk {
    pub name: String,
    pub size: u64,
}

/// A partition table on a physical disk, partitions in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    pub table_type: PTableType,
    pub partitions: Vec<MachinePartition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachinePartition {
    pub name: String,
    pub size: u64,
    pub bootable: bool,
}

/// A block device synthesized out of others: a RAID array, a logical
/// volume, or a bcache device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDevice {
    pub name: String,
    pub size: Option<u64>,
    pub kind: VirtualDeviceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualDeviceKind {
    Raid { level: u8 },
    LogicalVolume { group: String },
    BCache { cache_mode: Option<CacheMode> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// One bcache cache set; shared by every bcache device built over the
/// same cache device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSet {
    pub cache_device: String,
}

/// A filesystem attached to one device.  Member roles (RAID member,
/// LVM physical volume, bcache backing/cache) are modeled as unmounted
/// filesystems of the corresponding internal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineFilesystem {
    pub fstype: FsType,
    pub mount_point: Option<String>,
    pub mount_options: String,
}

/// A mounted pseudo filesystem with no backing device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialFilesystem {
    pub fstype: FsType,
    pub mount_point: String,
}

/// The machine's storage state, before and after layout application.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    pub(crate) physical_disks: BTreeMap<String, PhysicalDisk>,
    pub(crate) partition_tables: BTreeMap<String, PartitionTable>,
    pub(crate) virtual_devices: BTreeMap<String, VirtualDevice>,
    pub(crate) volume_groups: BTreeMap<String, VolumeGroup>,
    pub(crate) cache_sets: BTreeMap<String, CacheSet>,
    pub(crate) filesystems: BTreeMap<String, MachineFilesystem>,
    pub(crate) special_filesystems: Vec<SpecialFilesystem>,
    pub(crate) boot_disk: Option<String>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_physical_disk(&mut self, name: &str, size: u64) {
        self.physical_disks.insert(
            name.to_string(),
            PhysicalDisk { name: name.to_string(), size },
        );
    }

    pub fn physical_disk_names(&self) -> BTreeSet<&str> {
        self.physical_disks.keys().map(String::as_str).collect()
    }

    pub fn partition_table(&self, disk: &str) -> Option<&PartitionTable> {
        self.partition_tables.get(disk)
    }

    /// The filesystem on a named device, physical or virtual.
    pub fn filesystem(&self, device: &str) -> Option<&MachineFilesystem> {
        self.filesystems.get(device)
    }

    pub fn virtual_device(&self, name: &str) -> Option<&VirtualDevice> {
        self.virtual_devices.get(name)
    }

    pub fn volume_group(&self, name: &str) -> Option<&VolumeGroup> {
        self.volume_groups.get(name)
    }

    pub fn cache_sets(&self) -> impl Iterator<Item = &CacheSet> {
        self.cache_sets.values()
    }

    pub fn special_filesystems(&self) -> &[SpecialFilesystem] {
        &self.special_filesystems
    }

    pub fn boot_disk(&self) -> Option<&str> {
        self.boot_disk.as_deref()
    }

    /// Drops every configured storage object while keeping the
    /// physical disks themselves.
    pub fn clear_storage_configuration(&mut self) {
        self.partition_tables.clear();
        self.virtual_devices.clear();
        self.volume_groups.clear();
        self.cache_sets.clear();
        self.filesystems.clear();
        self.special_filesystems.clear();
        self.boot_disk = None;
    }
}
