// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compiles a declarative storage config into a dependency-ordered
//! entry list.
//!
//! The config is a document with two top-level mappings: `layout`
//! (device name to device definition, dispatched on a `type` field) and
//! `mounts` (mount path to device reference).  Flattening expands each
//! definition into one or more [`StorageEntry`] records; bare disks
//! referenced by name but never declared are inferred afterwards, then
//! mountpoints are attached and the entries topologically sorted.

use crate::entries::BCache;
use crate::entries::CacheMode;
use crate::entries::Disk;
use crate::entries::FileSystem;
use crate::entries::FsType;
use crate::entries::LogicalVolume;
use crate::entries::Lvm;
use crate::entries::PTableType;
use crate::entries::Partition;
use crate::entries::Raid;
use crate::entries::SpecialDevice;
use crate::entries::StorageEntry;
use crate::entries::get_size;
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

type Object = serde_json::Map<String, Value>;

const RAID_LEVELS: &[i64] = &[0, 1, 5, 6, 10];

/// A compiled layout: every entry by name, plus the same entries in an
/// order that satisfies their dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    entries: BTreeMap<String, StorageEntry>,
    sorted_entries: Vec<StorageEntry>,
}

impl StorageLayout {
    pub fn entries(&self) -> &BTreeMap<String, StorageEntry> {
        &self.entries
    }

    /// Entries in creation order: every entry appears after everything
    /// it depends on.
    pub fn sorted_entries(&self) -> &[StorageEntry] {
        &self.sorted_entries
    }

    /// Names of every physical disk the layout touches, declared or
    /// inferred.
    pub fn disk_names(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                StorageEntry::Disk(disk) => Some(disk.name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Parses and validates `config`, returning the compiled layout.
pub fn get_storage_layout(
    config: &Value,
) -> Result<StorageLayout, ConfigError> {
    let layout = top_level_object(config, "layout")?;
    let mounts = top_level_object(config, "mounts")?;

    let mut entries = Vec::new();
    for (name, definition) in layout {
        flatten_device(name, definition, &mut entries)?;
    }
    add_implicit_disks(&mut entries);
    set_mountpoints(&mut entries, mounts)?;
    check_special_mounts(&entries)?;
    let sorted_entries = sort_entries(&entries)?;

    let entries = entries
        .into_iter()
        .map(|entry| (entry.name().to_string(), entry))
        .collect();
    Ok(StorageLayout { entries, sorted_entries })
}

fn top_level_object<'a>(
    config: &'a Value,
    key: &'static str,
) -> Result<&'a Object, ConfigError> {
    let missing = || ConfigError::RequiredProperty {
        path: "top level".to_string(),
        key,
    };
    let section = config
        .as_object()
        .ok_or_else(missing)?
        .get(key)
        .ok_or_else(missing)?;
    section.as_object().ok_or_else(|| ConfigError::WrongType {
        path: "top level".to_string(),
        key: key.to_string(),
        expected: "object",
    })
}

fn flatten_device(
    name: &str,
    definition: &Value,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let path = format!("layout/{name}");
    let definition = definition.as_object().ok_or_else(|| {
        ConfigError::WrongType {
            path: "layout".to_string(),
            key: name.to_string(),
            expected: "object",
        }
    })?;
    match require_str(definition, &path, "type")? {
        "disk" => flatten_disk(name, definition, &path, out),
        "raid" => flatten_raid(name, definition, &path, out),
        "lvm" => flatten_lvm(name, definition, &path, out),
        "bcache" => flatten_bcache(name, definition, &path, out),
        "special" => flatten_special(name, definition, &path, out),
        other => {
            Err(ConfigError::UnsupportedDeviceType(other.to_string()))
        }
    }
}

fn flatten_disk(
    name: &str,
    definition: &Object,
    path: &str,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let ptable = optional_str(definition, path, "ptable")?
        .map(|value| {
            PTableType::from_config(value).ok_or_else(|| {
                ConfigError::InvalidPTableType {
                    name: name.to_string(),
                    value: value.to_string(),
                }
            })
        })
        .transpose()?;
    let boot = optional_bool(definition, path, "boot")?;
    let partitions = optional_object_array(definition, path, "partitions")?;
    if !partitions.is_empty() && ptable.is_none() {
        return Err(ConfigError::MissingPTable(name.to_string()));
    }

    out.push(StorageEntry::Disk(Disk {
        name: name.to_string(),
        ptable,
        boot,
    }));
    let mut previous: Option<String> = None;
    for partition in partitions {
        let part_name = require_str(partition, path, "name")?;
        let size = get_size(require_str(partition, path, "size")?)?;
        let bootable = optional_bool(partition, path, "bootable")?;
        out.push(StorageEntry::Partition(Partition {
            name: part_name.to_string(),
            on: name.to_string(),
            size,
            bootable,
            after: previous.replace(part_name.to_string()),
        }));
        if let Some(fs) = optional_str(partition, path, "fs")? {
            out.push(filesystem_entry(part_name, fs)?);
        }
    }
    Ok(())
}

fn flatten_raid(
    name: &str,
    definition: &Object,
    path: &str,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let level = match definition.get("level") {
        None => {
            return Err(ConfigError::RequiredProperty {
                path: path.to_string(),
                key: "level",
            });
        }
        Some(value) => match value.as_i64() {
            Some(level) if RAID_LEVELS.contains(&level) => level as u8,
            Some(level) => {
                return Err(ConfigError::InvalidRaidLevel {
                    name: name.to_string(),
                    value: level,
                });
            }
            None => {
                return Err(ConfigError::WrongType {
                    path: path.to_string(),
                    key: "level".to_string(),
                    expected: "integer",
                });
            }
        },
    };
    let members = require_str_array(definition, path, "members")?;
    let spares = optional_str_array(definition, path, "spares")?;
    if level == 0 && !spares.is_empty() {
        return Err(ConfigError::RaidZeroWithSpares);
    }
    if members.iter().any(|member| spares.contains(member)) {
        return Err(ConfigError::RaidDuplicatedDevices(name.to_string()));
    }

    out.push(StorageEntry::Raid(Raid {
        name: name.to_string(),
        level,
        members,
        spares,
    }));
    if let Some(fs) = optional_str(definition, path, "fs")? {
        out.push(filesystem_entry(name, fs)?);
    }
    Ok(())
}

fn flatten_lvm(
    name: &str,
    definition: &Object,
    path: &str,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let members = require_str_array(definition, path, "members")?;
    out.push(StorageEntry::Lvm(Lvm { name: name.to_string(), members }));
    for volume in optional_object_array(definition, path, "volumes")? {
        let volume_name = require_str(volume, path, "name")?;
        let size = get_size(require_str(volume, path, "size")?)?;
        out.push(StorageEntry::LogicalVolume(LogicalVolume {
            name: volume_name.to_string(),
            on: name.to_string(),
            size,
        }));
        if let Some(fs) = optional_str(volume, path, "fs")? {
            out.push(filesystem_entry(volume_name, fs)?);
        }
    }
    Ok(())
}

fn flatten_bcache(
    name: &str,
    definition: &Object,
    path: &str,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let backing_device = require_str(definition, path, "backing-device")?;
    let cache_device = require_str(definition, path, "cache-device")?;
    let cache_mode = optional_str(definition, path, "cache-mode")?
        .map(|value| {
            CacheMode::from_config(value).ok_or_else(|| {
                ConfigError::InvalidCacheMode {
                    name: name.to_string(),
                    value: value.to_string(),
                }
            })
        })
        .transpose()?;

    out.push(StorageEntry::BCache(BCache {
        name: name.to_string(),
        backing_device: backing_device.to_string(),
        cache_device: cache_device.to_string(),
        cache_mode,
    }));
    if let Some(fs) = optional_str(definition, path, "fs")? {
        out.push(filesystem_entry(name, fs)?);
    }
    Ok(())
}

fn flatten_special(
    name: &str,
    definition: &Object,
    path: &str,
    out: &mut Vec<StorageEntry>,
) -> Result<(), ConfigError> {
    let fs = require_str(definition, path, "fs")?;
    let fstype = FsType::from_special_config(fs).ok_or_else(|| {
        ConfigError::InvalidSpecialFilesystem(fs.to_string())
    })?;
    out.push(StorageEntry::Special(SpecialDevice {
        name: name.to_string(),
    }));
    out.push(StorageEntry::FileSystem(FileSystem {
        name: format!("{name}[fs]"),
        on: name.to_string(),
        fstype,
        mount: None,
        mount_options: None,
    }));
    Ok(())
}

fn filesystem_entry(
    device: &str,
    fs: &str,
) -> Result<StorageEntry, ConfigError> {
    let fstype = FsType::from_config(fs).ok_or_else(|| {
        ConfigError::UnknownFilesystemType(fs.to_string())
    })?;
    Ok(StorageEntry::FileSystem(FileSystem {
        name: format!("{device}[fs]"),
        on: device.to_string(),
        fstype,
        mount: None,
        mount_options: None,
    }))
}

/// Declares a bare disk for every name that is depended on but never
/// defined, so configs can reference physical disks without
/// re-declaring them.  Added in name order for determinism.
fn add_implicit_disks(entries: &mut Vec<StorageEntry>) {
    let declared: BTreeSet<String> =
        entries.iter().map(|entry| entry.name().to_string()).collect();
    let mut missing = BTreeSet::new();
    for entry in entries.iter() {
        for dep in entry.deps() {
            if !declared.contains(dep) {
                missing.insert(dep.to_string());
            }
        }
    }
    for name in missing {
        entries.push(StorageEntry::Disk(Disk {
            name,
            ptable: None,
            boot: false,
        }));
    }
}

fn set_mountpoints(
    entries: &mut [StorageEntry],
    mounts: &Object,
) -> Result<(), ConfigError> {
    for (mount_path, definition) in mounts {
        let path = format!("mounts/{mount_path}");
        let definition = definition.as_object().ok_or_else(|| {
            ConfigError::WrongType {
                path: "mounts".to_string(),
                key: mount_path.to_string(),
                expected: "object",
            }
        })?;
        let device = require_str(definition, &path, "device")?;
        let options = optional_str(definition, &path, "options")?;

        let fs_name = format!("{device}[fs]");
        let fs = entries
            .iter_mut()
            .find_map(|entry| match entry {
                StorageEntry::FileSystem(fs) if fs.name == fs_name => {
                    Some(fs)
                }
                _ => None,
            })
            .ok_or_else(|| {
                ConfigError::FilesystemNotFound(device.to_string())
            })?;
        fs.mount = Some(mount_path.clone());
        fs.mount_options = options.map(str::to_string);
    }
    Ok(())
}

/// Every special device must end up mounted; an unmounted tmpfs/ramfs
/// can never take effect.
fn check_special_mounts(
    entries: &[StorageEntry],
) -> Result<(), ConfigError> {
    let mounted: BTreeSet<&str> = entries
        .iter()
        .filter_map(|entry| match entry {
            StorageEntry::FileSystem(fs) if fs.mount.is_some() => {
                Some(fs.on.as_str())
            }
            _ => None,
        })
        .collect();
    let mut unmounted: Vec<String> = entries
        .iter()
        .filter_map(|entry| match entry {
            StorageEntry::Special(special)
                if !mounted.contains(special.name.as_str()) =>
            {
                Some(special.name.clone())
            }
            _ => None,
        })
        .collect();
    if unmounted.is_empty() {
        Ok(())
    } else {
        unmounted.sort();
        Err(ConfigError::UnmountedSpecialDevices(unmounted))
    }
}

/// Repeatedly moves every entry whose dependencies are all satisfied to
/// the output.  Layouts are tens of entries at most, so the quadratic
/// scan is fine.  A full pass with no progress means the dependency
/// graph has a cycle.
fn sort_entries(
    entries: &[StorageEntry],
) -> Result<Vec<StorageEntry>, ConfigError> {
    let mut remaining: Vec<&StorageEntry> = entries.iter().collect();
    let mut sorted = Vec::with_capacity(entries.len());
    let mut sorted_names: BTreeSet<&str> = BTreeSet::new();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|entry| {
            let satisfied = entry
                .deps()
                .iter()
                .all(|dep| sorted_names.contains(dep));
            if satisfied {
                sorted_names.insert(entry.name());
                sorted.push((*entry).clone());
            }
            !satisfied
        });
        if remaining.len() == before {
            let mut stuck: Vec<String> = remaining
                .iter()
                .map(|entry| entry.name().to_string())
                .collect();
            stuck.sort();
            return Err(ConfigError::DependencyCycle(stuck));
        }
    }
    Ok(sorted)
}

fn require_str<'a>(
    definition: &'a Object,
    path: &str,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    match definition.get(key) {
        None => Err(ConfigError::RequiredProperty {
            path: path.to_string(),
            key,
        }),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(wrong_type(path, key, "string")),
    }
}

fn optional_str<'a>(
    definition: &'a Object,
    path: &str,
    key: &'static str,
) -> Result<Option<&'a str>, ConfigError> {
    match definition.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(wrong_type(path, key, "string")),
    }
}

fn optional_bool(
    definition: &Object,
    path: &str,
    key: &'static str,
) -> Result<bool, ConfigError> {
    match definition.get(key) {
        None => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(_) => Err(wrong_type(path, key, "boolean")),
    }
}

fn require_str_array(
    definition: &Object,
    path: &str,
    key: &'static str,
) -> Result<Vec<String>, ConfigError> {
    match definition.get(key) {
        None => Err(ConfigError::RequiredProperty {
            path: path.to_string(),
            key,
        }),
        Some(value) => str_array(value, path, key),
    }
}

fn optional_str_array(
    definition: &Object,
    path: &str,
    key: &'static str,
) -> Result<Vec<String>, ConfigError> {
    match definition.get(key) {
        None => Ok(vec![]),
        Some(value) => str_array(value, path, key),
    }
}

fn str_array(
    value: &Value,
    path: &str,
    key: &'static str,
) -> Result<Vec<String>, ConfigError> {
    value
        .as_array()
        .ok_or_else(|| wrong_type(path, key, "array"))?
        .iter()
        .map(|element| {
            element
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(path, key, "string"))
        })
        .collect()
}

fn optional_object_array<'a>(
    definition: &'a Object,
    path: &str,
    key: &'static str,
) -> Result<Vec<&'a Object>, ConfigError> {
    match definition.get(key) {
        None => Ok(vec![]),
        Some(value) => value
            .as_array()
            .ok_or_else(|| wrong_type(path, key, "array"))?
            .iter()
            .map(|element| {
                element
                    .as_object()
                    .ok_or_else(|| wrong_type(path, key, "object"))
            })
            .collect(),
    }
}

fn wrong_type(
    path: &str,
    key: &'static str,
    expected: &'static str,
) -> ConfigError {
    ConfigError::WrongType {
        path: path.to_string(),
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sorted_names(layout: &StorageLayout) -> Vec<&str> {
        layout.sorted_entries().iter().map(StorageEntry::name).collect()
    }

    #[test]
    fn simple_disk_layout() {
        let config = json!({
            "layout": {
                "sda": {
                    "type": "disk",
                    "ptable": "gpt",
                    "boot": true,
                    "partitions": [
                        {
                            "name": "sda1",
                            "size": "100M",
                            "fs": "vfat",
                            "bootable": true,
                        },
                        {
                            "name": "sda2",
                            "size": "20G",
                            "fs": "ext4",
                        },
                    ],
                },
            },
            "mounts": {
                "/": {
                    "device": "sda2",
                    "options": "noatime",
                },
                "/boot/efi": {
                    "device": "sda1",
                },
            },
        });
        let layout = get_storage_layout(&config).unwrap();

        let expected: BTreeMap<String, StorageEntry> = [
            StorageEntry::Disk(Disk {
                name: "sda".to_string(),
                ptable: Some(PTableType::Gpt),
                boot: true,
            }),
            StorageEntry::Partition(Partition {
                name: "sda1".to_string(),
                on: "sda".to_string(),
                size: 100_000_000,
                bootable: true,
                after: None,
            }),
            StorageEntry::FileSystem(FileSystem {
                name: "sda1[fs]".to_string(),
                on: "sda1".to_string(),
                fstype: FsType::Vfat,
                mount: Some("/boot/efi".to_string()),
                mount_options: None,
            }),
            StorageEntry::Partition(Partition {
                name: "sda2".to_string(),
                on: "sda".to_string(),
                size: 20_000_000_000,
                bootable: false,
                after: Some("sda1".to_string()),
            }),
            StorageEntry::FileSystem(FileSystem {
                name: "sda2[fs]".to_string(),
                on: "sda2".to_string(),
                fstype: FsType::Ext4,
                mount: Some("/".to_string()),
                mount_options: Some("noatime".to_string()),
            }),
        ]
        .into_iter()
        .map(|entry| (entry.name().to_string(), entry))
        .collect();
        assert_eq!(layout.entries(), &expected);
        assert_eq!(
            sorted_names(&layout),
            vec!["sda", "sda1", "sda1[fs]", "sda2", "sda2[fs]"]
        );
        assert_eq!(layout.disk_names(), ["sda"].into_iter().collect());
    }

    #[test]
    fn special_devices_become_mounted_filesystems() {
        let config = json!({
            "layout": {
                "special1": {"type": "special", "fs": "tmpfs"},
                "special2": {"type": "special", "fs": "ramfs"},
            },
            "mounts": {
                "/temp1": {"device": "special1"},
                "/temp2": {"device": "special2"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec!["special1", "special1[fs]", "special2", "special2[fs]"]
        );
        let Some(StorageEntry::FileSystem(fs)) =
            layout.entries().get("special1[fs]")
        else {
            panic!("special1[fs] missing");
        };
        assert_eq!(fs.fstype, FsType::Tmpfs);
        assert_eq!(fs.mount.as_deref(), Some("/temp1"));
    }

    #[test]
    fn raid_over_partitions_sorts_after_them() {
        let config = json!({
            "layout": {
                "sda": {
                    "type": "disk",
                    "ptable": "gpt",
                    "partitions": [
                        {"name": "sda1", "size": "100M", "fs": "vfat"},
                        {"name": "sda2", "size": "20G"},
                    ],
                },
                "sdb": {
                    "type": "disk",
                    "ptable": "gpt",
                    "partitions": [
                        {"name": "sdb1", "size": "100M"},
                        {"name": "sdb2", "size": "20G"},
                    ],
                },
                "raid0": {
                    "type": "raid",
                    "level": 0,
                    "members": ["sda2", "sdb2"],
                    "fs": "ext4",
                },
            },
            "mounts": {
                "/": {"device": "raid0", "options": "noatime"},
                "/boot/efi": {"device": "sda1"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec![
                "sda",
                "sda1",
                "sda1[fs]",
                "sda2",
                "sdb",
                "sdb1",
                "sdb2",
                "raid0",
                "raid0[fs]",
            ]
        );
        assert_eq!(
            layout.entries().get("raid0"),
            Some(&StorageEntry::Raid(Raid {
                name: "raid0".to_string(),
                level: 0,
                members: vec!["sda2".to_string(), "sdb2".to_string()],
                spares: vec![],
            }))
        );
        assert_eq!(
            layout.disk_names(),
            ["sda", "sdb"].into_iter().collect()
        );
    }

    #[test]
    fn referenced_disks_are_inferred() {
        let config = json!({
            "layout": {
                "md0": {
                    "type": "raid",
                    "level": 1,
                    "members": ["sda", "sdb"],
                    "spares": ["sdc"],
                    "fs": "ext4",
                },
            },
            "mounts": {
                "/data": {"device": "md0"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec!["sda", "sdb", "sdc", "md0", "md0[fs]"]
        );
        assert_eq!(
            layout.entries().get("sdc"),
            Some(&StorageEntry::Disk(Disk {
                name: "sdc".to_string(),
                ptable: None,
                boot: false,
            }))
        );
        assert_eq!(
            layout.disk_names(),
            ["sda", "sdb", "sdc"].into_iter().collect()
        );
    }

    #[test]
    fn lvm_volumes_keep_their_declared_order() {
        let config = json!({
            "layout": {
                "storage": {
                    "type": "lvm",
                    "members": ["sda", "sdb"],
                    "volumes": [
                        {"name": "root", "size": "10G", "fs": "ext4"},
                        {"name": "data", "size": "140G", "fs": "btrfs"},
                    ],
                },
            },
            "mounts": {
                "/": {"device": "root", "options": "noatime"},
                "/data": {"device": "data"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec![
                "sda",
                "sdb",
                "storage",
                "root",
                "root[fs]",
                "data",
                "data[fs]",
            ]
        );
        assert_eq!(
            layout.entries().get("data"),
            Some(&StorageEntry::LogicalVolume(LogicalVolume {
                name: "data".to_string(),
                on: "storage".to_string(),
                size: 140_000_000_000,
            }))
        );
    }

    #[test]
    fn nested_virtual_devices_sort_bottom_up() {
        let config = json!({
            "layout": {
                "raid5": {
                    "type": "raid",
                    "level": 5,
                    "members": ["sda", "sdb", "sdc", "sdd", "sde"],
                },
                "lvm0": {
                    "type": "lvm",
                    "members": ["raid5"],
                    "volumes": [
                        {"name": "root", "size": "10G", "fs": "ext4"},
                        {"name": "storage", "size": "500G", "fs": "xfs"},
                    ],
                },
            },
            "mounts": {
                "/": {"device": "root", "options": "noatime"},
                "/storage": {"device": "storage"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec![
                "sda",
                "sdb",
                "sdc",
                "sdd",
                "sde",
                "raid5",
                "lvm0",
                "root",
                "root[fs]",
                "storage",
                "storage[fs]",
            ]
        );
    }

    #[test]
    fn bcache_layout_infers_the_cache_disk() {
        let config = json!({
            "layout": {
                "sda": {
                    "type": "disk",
                    "ptable": "gpt",
                    "partitions": [
                        {"name": "sda1", "size": "100M", "fs": "vfat"},
                        {"name": "sda2", "size": "100G"},
                    ],
                },
                "fast-root": {
                    "type": "bcache",
                    "backing-device": "sda2",
                    "cache-device": "sdb",
                    "cache-mode": "writeback",
                    "fs": "ext4",
                },
            },
            "mounts": {
                "/": {"device": "fast-root", "options": "noatime"},
                "/boot/efi": {"device": "sda1"},
            },
        });
        let layout = get_storage_layout(&config).unwrap();
        assert_eq!(
            sorted_names(&layout),
            vec![
                "sda",
                "sda1",
                "sda1[fs]",
                "sda2",
                "sdb",
                "fast-root",
                "fast-root[fs]",
            ]
        );
        assert_eq!(
            layout.entries().get("fast-root"),
            Some(&StorageEntry::BCache(BCache {
                name: "fast-root".to_string(),
                backing_device: "sda2".to_string(),
                cache_device: "sdb".to_string(),
                cache_mode: Some(CacheMode::Writeback),
            }))
        );
        assert_eq!(
            layout.disk_names(),
            ["sda", "sdb"].into_iter().collect()
        );
    }

    #[test]
    fn unknown_device_type_is_rejected() {
        let config = json!({
            "layout": {"device": {"type": "unknown"}},
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported device type 'unknown'");
    }

    #[test]
    fn unknown_partition_table_type_is_rejected() {
        let config = json!({
            "layout": {"sda": {"type": "disk", "ptable": "foo"}},
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at layout/sda/ptable: \
             'foo' is not one of ['gpt', 'mbr']"
        );
    }

    #[test]
    fn partitions_require_a_partition_table() {
        let config = json!({
            "layout": {
                "sda": {
                    "type": "disk",
                    "partitions": [
                        {"name": "sda1", "size": "10G", "fs": "ext4"},
                    ],
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Partition table not specified for 'sda'"
        );
    }

    #[test]
    fn unknown_filesystem_type_is_rejected() {
        let config = json!({
            "layout": {
                "sda": {
                    "type": "disk",
                    "ptable": "gpt",
                    "partitions": [
                        {"name": "sda1", "size": "100M", "fs": "foo"},
                    ],
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(err.to_string(), "Unknown filesystem type 'foo'");
    }

    #[test]
    fn unknown_cache_mode_is_rejected() {
        let config = json!({
            "layout": {
                "bcache0": {
                    "type": "bcache",
                    "backing-device": "sda",
                    "cache-device": "sdb",
                    "cache-mode": "foo",
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at layout/bcache0/cache-mode: 'foo' is not \
             one of ['writeback', 'writethrough', 'writearound']"
        );
    }

    #[test]
    fn unknown_raid_level_is_rejected() {
        let config = json!({
            "layout": {
                "md0": {
                    "type": "raid",
                    "level": 123,
                    "members": ["sda", "sdb"],
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at layout/md0/level: \
             123 is not one of [0, 1, 5, 6, 10]"
        );
    }

    #[test]
    fn raid_zero_rejects_spares() {
        let config = json!({
            "layout": {
                "md0": {
                    "type": "raid",
                    "level": 0,
                    "members": ["sda", "sdb"],
                    "spares": ["sdc", "sdd"],
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(err.to_string(), "RAID level 0 doesn't support spares");
    }

    #[test]
    fn raid_rejects_overlapping_members_and_spares() {
        let config = json!({
            "layout": {
                "md0": {
                    "type": "raid",
                    "level": 5,
                    "members": ["sda", "sdb", "sdc"],
                    "spares": ["sdb", "sdd"],
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "RAID 'md0' has duplicated devices in members and spares"
        );
    }

    #[test]
    fn specials_only_take_special_filesystems() {
        let config = json!({
            "layout": {"special": {"type": "special", "fs": "ext4"}},
            "mounts": {"/temp": {"device": "special"}},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(err.to_string(), "Invalid special filesystem 'ext4'");
    }

    #[test]
    fn unmounted_specials_are_named_sorted() {
        let config = json!({
            "layout": {
                "special1": {"type": "special", "fs": "tmpfs"},
                "special2": {"type": "special", "fs": "ramfs"},
                "special3": {"type": "special", "fs": "tmpfs"},
            },
            "mounts": {
                "/temp2": {"device": "special2"},
            },
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Special device(s) missing mountpoint: special1, special3"
        );
    }

    #[test]
    fn missing_required_keys_name_the_entry() {
        let config = json!({
            "layout": {"lvm0": {"type": "lvm"}},
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at layout/lvm0: \
             'members' is a required property"
        );
    }

    #[test]
    fn mounts_need_a_matching_filesystem() {
        let config = json!({
            "layout": {"sda": {"type": "disk"}},
            "mounts": {"/": {"device": "sda"}},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Filesystem not found for device 'sda'"
        );
    }

    #[test]
    fn missing_layout_section_is_rejected() {
        let err = get_storage_layout(&json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at top level: 'layout' is a required property"
        );
    }

    #[test]
    fn missing_mounts_section_is_rejected() {
        let config = json!({
            "layout": {"sda": {"type": "disk"}},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid config at top level: 'mounts' is a required property"
        );
    }

    #[test]
    fn dependency_cycles_are_detected() {
        let config = json!({
            "layout": {
                "bcache0": {
                    "type": "bcache",
                    "backing-device": "bcache1",
                    "cache-device": "sda",
                },
                "bcache1": {
                    "type": "bcache",
                    "backing-device": "bcache0",
                    "cache-device": "sdb",
                },
            },
            "mounts": {},
        });
        let err = get_storage_layout(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dependency cycle in layout: bcache0, bcache1"
        );
    }
}
