// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The flattened storage entries a layout compiles into, plus the small
//! vocabulary types (filesystem, partition table, cache mode) and size
//! parsing they share.

use crate::error::ConfigError;

/// A physical disk, optionally carrying a partition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub name: String,
    pub ptable: Option<PTableType>,
    pub boot: bool,
}

/// A partition on a disk.  `after` chains a partition to its preceding
/// sibling so partitions keep their declared on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub on: String,
    pub size: u64,
    pub bootable: bool,
    pub after: Option<String>,
}

/// A filesystem on some device.  These are synthesized with a
/// `<device>[fs]` name; mountpoints are attached from the `mounts`
/// section after flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystem {
    pub name: String,
    pub on: String,
    pub fstype: FsType,
    pub mount: Option<String>,
    pub mount_options: Option<String>,
}

/// A software RAID array over whole devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raid {
    pub name: String,
    pub level: u8,
    pub members: Vec<String>,
    pub spares: Vec<String>,
}

/// An LVM volume group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lvm {
    pub name: String,
    pub members: Vec<String>,
}

/// A logical volume inside a volume group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalVolume {
    pub name: String,
    pub on: String,
    pub size: u64,
}

/// A bcache device pairing a backing device with a cache device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BCache {
    pub name: String,
    pub backing_device: String,
    pub cache_device: String,
    pub cache_mode: Option<CacheMode>,
}

/// A device that exists only as a mounted special filesystem (tmpfs,
/// ramfs); no block device backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialDevice {
    pub name: String,
}

/// One entry of a compiled layout.  The set of variants is closed:
/// flattening and application both match exhaustively, so adding a
/// device type forces every dispatch site to handle it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEntry {
    Disk(Disk),
    Partition(Partition),
    FileSystem(FileSystem),
    Raid(Raid),
    Lvm(Lvm),
    LogicalVolume(LogicalVolume),
    BCache(BCache),
    Special(SpecialDevice),
}

impl StorageEntry {
    pub fn name(&self) -> &str {
        match self {
            StorageEntry::Disk(e) => &e.name,
            StorageEntry::Partition(e) => &e.name,
            StorageEntry::FileSystem(e) => &e.name,
            StorageEntry::Raid(e) => &e.name,
            StorageEntry::Lvm(e) => &e.name,
            StorageEntry::LogicalVolume(e) => &e.name,
            StorageEntry::BCache(e) => &e.name,
            StorageEntry::Special(e) => &e.name,
        }
    }

    /// Names of the entries this one must be created after.
    pub fn deps(&self) -> Vec<&str> {
        match self {
            StorageEntry::Disk(_) | StorageEntry::Special(_) => vec![],
            StorageEntry::Partition(e) => {
                let mut deps = vec![e.on.as_str()];
                if let Some(after) = &e.after {
                    deps.push(after);
                }
                deps
            }
            StorageEntry::FileSystem(e) => vec![e.on.as_str()],
            StorageEntry::Raid(e) => e
                .members
                .iter()
                .chain(&e.spares)
                .map(String::as_str)
                .collect(),
            StorageEntry::Lvm(e) => {
                e.members.iter().map(String::as_str).collect()
            }
            StorageEntry::LogicalVolume(e) => vec![e.on.as_str()],
            StorageEntry::BCache(e) => {
                vec![e.backing_device.as_str(), e.cache_device.as_str()]
            }
        }
    }
}

/// Partition table flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PTableType {
    Gpt,
    Mbr,
}

impl PTableType {
    pub(crate) fn from_config(value: &str) -> Option<Self> {
        match value {
            "gpt" => Some(PTableType::Gpt),
            "mbr" => Some(PTableType::Mbr),
            _ => None,
        }
    }
}

/// bcache cache modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Writeback,
    Writethrough,
    Writearound,
}

impl CacheMode {
    pub(crate) fn from_config(value: &str) -> Option<Self> {
        match value {
            "writeback" => Some(CacheMode::Writeback),
            "writethrough" => Some(CacheMode::Writethrough),
            "writearound" => Some(CacheMode::Writearound),
            _ => None,
        }
    }
}

/// Filesystem types.  The first group can be named in a config; the
/// `Tmpfs`/`Ramfs` pair only on `special` devices; the rest are created
/// by the applier to mark member roles and never parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    Btrfs,
    Ext2,
    Ext4,
    Fat32,
    Swap,
    Vfat,
    Xfs,
    Zfsroot,
    Tmpfs,
    Ramfs,
    LvmPv,
    Raid,
    RaidSpare,
    BcacheBacking,
    BcacheCache,
}

impl FsType {
    pub(crate) fn from_config(value: &str) -> Option<Self> {
        match value {
            "btrfs" => Some(FsType::Btrfs),
            "ext2" => Some(FsType::Ext2),
            "ext4" => Some(FsType::Ext4),
            "fat32" => Some(FsType::Fat32),
            "swap" => Some(FsType::Swap),
            "vfat" => Some(FsType::Vfat),
            "xfs" => Some(FsType::Xfs),
            "zfsroot" => Some(FsType::Zfsroot),
            _ => None,
        }
    }

    pub(crate) fn from_special_config(value: &str) -> Option<Self> {
        match value {
            "tmpfs" => Some(FsType::Tmpfs),
            "ramfs" => Some(FsType::Ramfs),
            _ => None,
        }
    }

    /// True for filesystems that exist only as mounted pseudo
    /// filesystems with no backing block device.
    pub fn is_special(&self) -> bool {
        matches!(self, FsType::Tmpfs | FsType::Ramfs)
    }
}

/// Parses a `<number><M|G|T>` size string into bytes, with decimal
/// multipliers.  Fractional values are allowed; zero and negative
/// values are not.
pub(crate) fn get_size(size: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSize(size.to_string());
    let (number, multiplier) = if let Some(n) = size.strip_suffix('M') {
        (n, 1000u64.pow(2))
    } else if let Some(n) = size.strip_suffix('G') {
        (n, 1000u64.pow(3))
    } else if let Some(n) = size.strip_suffix('T') {
        (n, 1000u64.pow(4))
    } else {
        return Err(invalid());
    };
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if value < 0.0 {
        return Err(ConfigError::NegativeSize(size.to_string()));
    }
    let bytes = (value * multiplier as f64) as u64;
    if bytes == 0 {
        return Err(invalid());
    }
    Ok(bytes)
}
