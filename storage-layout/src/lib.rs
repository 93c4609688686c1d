// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative storage-layout compiler.
//!
//! Operators describe a machine's desired storage as nested maps
//! (disks with partitions, RAID arrays, LVM groups, bcache devices,
//! special filesystems); [`get_storage_layout`] validates that
//! description and flattens it into a dependency-ordered entry list,
//! and [`apply_layout_to_machine`] replays the entries against one
//! machine's block devices.
//!
//! Failures split along whose fault they are: [`ConfigError`] means the
//! config itself is wrong, [`UnappliableLayout`] means a valid config
//! was pointed at hardware that does not match it.

mod apply;
mod config;
mod entries;
mod error;
mod machine;

pub use apply::apply_layout_to_machine;
pub use config::StorageLayout;
pub use config::get_storage_layout;
pub use entries::BCache;
pub use entries::CacheMode;
pub use entries::Disk;
pub use entries::FileSystem;
pub use entries::FsType;
pub use entries::LogicalVolume;
pub use entries::Lvm;
pub use entries::PTableType;
pub use entries::Partition;
pub use entries::Raid;
pub use entries::SpecialDevice;
pub use entries::StorageEntry;
pub use error::ConfigError;
pub use error::UnappliableLayout;
pub use machine::CacheSet;
pub use machine::Machine;
pub use machine::MachineFilesystem;
pub use machine::MachinePartition;
pub use machine::PartitionTable;
pub use machine::PhysicalDisk;
pub use machine::SpecialFilesystem;
pub use machine::VirtualDevice;
pub use machine::VirtualDeviceKind;
pub use machine::VolumeGroup;
