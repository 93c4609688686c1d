// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Applies a compiled layout to a machine's storage model.

use crate::config::StorageLayout;
use crate::entries::FsType;
use crate::entries::StorageEntry;
use crate::error::UnappliableLayout;
use crate::machine::CacheSet;
use crate::machine::Machine;
use crate::machine::MachineFilesystem;
use crate::machine::MachinePartition;
use crate::machine::PartitionTable;
use crate::machine::SpecialFilesystem;
use crate::machine::VirtualDevice;
use crate::machine::VirtualDeviceKind;
use crate::machine::VolumeGroup;
use slog::Logger;
use slog::debug;
use slog::info;

/// Partitions and logical volumes are aligned to 4 MiB blocks; sizes
/// round down so an entry never outgrows what the operator asked for.
const PARTITION_ALIGNMENT_SIZE: u64 = 4 * 1024 * 1024;

fn round_to_alignment(size: u64) -> u64 {
    size / PARTITION_ALIGNMENT_SIZE * PARTITION_ALIGNMENT_SIZE
}

/// Replaces `machine`'s storage configuration with `layout`.
///
/// The machine is checked against the layout before anything is
/// touched: if any referenced disk is missing, the existing
/// configuration survives intact.  On success the previous
/// configuration is dropped and the sorted entries are created in
/// order.
pub fn apply_layout_to_machine(
    log: &Logger,
    layout: &StorageLayout,
    machine: &mut Machine,
) -> Result<(), UnappliableLayout> {
    let missing: Vec<String> = layout
        .disk_names()
        .into_iter()
        .filter(|name| !machine.physical_disks.contains_key(*name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        // disk_names() iterates sorted, so missing already is.
        return Err(UnappliableLayout { missing });
    }

    machine.clear_storage_configuration();
    info!(
        log, "applying storage layout";
        "entries" => layout.sorted_entries().len(),
    );

    for entry in layout.sorted_entries() {
        debug!(log, "creating storage entry"; "name" => entry.name());
        match entry {
            StorageEntry::Disk(disk) => {
                if let Some(table_type) = disk.ptable {
                    machine.partition_tables.insert(
                        disk.name.clone(),
                        PartitionTable { table_type, partitions: vec![] },
                    );
                }
                if disk.boot {
                    machine.boot_disk = Some(disk.name.clone());
                }
            }
            StorageEntry::Partition(partition) => {
                let table = machine
                    .partition_tables
                    .get_mut(&partition.on)
                    .expect("sorted entries place partitions after their disk");
                table.partitions.push(MachinePartition {
                    name: partition.name.clone(),
                    size: round_to_alignment(partition.size),
                    bootable: partition.bootable,
                });
            }
            StorageEntry::FileSystem(fs) => {
                if fs.fstype.is_special() {
                    // The parser rejects unmounted special devices.
                    if let Some(mount_point) = &fs.mount {
                        machine.special_filesystems.push(
                            SpecialFilesystem {
                                fstype: fs.fstype,
                                mount_point: mount_point.clone(),
                            },
                        );
                    }
                } else {
                    machine.filesystems.insert(
                        fs.on.clone(),
                        MachineFilesystem {
                            fstype: fs.fstype,
                            mount_point: fs.mount.clone(),
                            mount_options: fs
                                .mount_options
                                .clone()
                                .unwrap_or_default(),
                        },
                    );
                }
            }
            StorageEntry::Raid(raid) => {
                for member in &raid.members {
                    member_filesystem(machine, member, FsType::Raid);
                }
                for spare in &raid.spares {
                    member_filesystem(machine, spare, FsType::RaidSpare);
                }
                machine.virtual_devices.insert(
                    raid.name.clone(),
                    VirtualDevice {
                        name: raid.name.clone(),
                        size: None,
                        kind: VirtualDeviceKind::Raid { level: raid.level },
                    },
                );
            }
            StorageEntry::Lvm(lvm) => {
                for member in &lvm.members {
                    member_filesystem(machine, member, FsType::LvmPv);
                }
                machine.volume_groups.insert(
                    lvm.name.clone(),
                    VolumeGroup {
                        name: lvm.name.clone(),
                        members: lvm.members.clone(),
                    },
                );
            }
            StorageEntry::LogicalVolume(volume) => {
                machine.virtual_devices.insert(
                    volume.name.clone(),
                    VirtualDevice {
                        name: volume.name.clone(),
                        size: Some(round_to_alignment(volume.size)),
                        kind: VirtualDeviceKind::LogicalVolume {
                            group: volume.on.clone(),
                        },
                    },
                );
            }
            StorageEntry::BCache(bcache) => {
                // One cache set per distinct cache device, shared by
                // every bcache built over it.
                let cacheset_key =
                    format!("{}[cacheset]", bcache.cache_device);
                if !machine.cache_sets.contains_key(&cacheset_key) {
                    machine.cache_sets.insert(
                        cacheset_key,
                        CacheSet {
                            cache_device: bcache.cache_device.clone(),
                        },
                    );
                    member_filesystem(
                        machine,
                        &bcache.cache_device,
                        FsType::BcacheCache,
                    );
                }
                member_filesystem(
                    machine,
                    &bcache.backing_device,
                    FsType::BcacheBacking,
                );
                machine.virtual_devices.insert(
                    bcache.name.clone(),
                    VirtualDevice {
                        name: bcache.name.clone(),
                        size: None,
                        kind: VirtualDeviceKind::BCache {
                            cache_mode: bcache.cache_mode,
                        },
                    },
                );
            }
            StorageEntry::Special(_) => {
                // Realized through its filesystem entry.
            }
        }
    }
    Ok(())
}

fn member_filesystem(machine: &mut Machine, device: &str, fstype: FsType) {
    machine.filesystems.insert(
        device.to_string(),
        MachineFilesystem {
            fstype,
            mount_point: None,
            mount_options: String::new(),
        },
    );
}
