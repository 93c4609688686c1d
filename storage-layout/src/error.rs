// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// A malformed or invalid layout configuration.  The rendered messages
/// are shown verbatim to the operator who wrote the config and are part
/// of the deployment tooling's contract; do not reword them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config at {path}: '{key}' is a required property")]
    RequiredProperty { path: String, key: &'static str },

    #[error("Invalid config at {path}: '{key}' is not of type '{expected}'")]
    WrongType { path: String, key: String, expected: &'static str },

    #[error(
        "Invalid config at layout/{name}/ptable: \
         '{value}' is not one of ['gpt', 'mbr']"
    )]
    InvalidPTableType { name: String, value: String },

    #[error(
        "Invalid config at layout/{name}/cache-mode: '{value}' is not \
         one of ['writeback', 'writethrough', 'writearound']"
    )]
    InvalidCacheMode { name: String, value: String },

    #[error(
        "Invalid config at layout/{name}/level: \
         {value} is not one of [0, 1, 5, 6, 10]"
    )]
    InvalidRaidLevel { name: String, value: i64 },

    #[error("Unsupported device type '{0}'")]
    UnsupportedDeviceType(String),

    #[error("Partition table not specified for '{0}'")]
    MissingPTable(String),

    #[error("Unknown filesystem type '{0}'")]
    UnknownFilesystemType(String),

    #[error("RAID level 0 doesn't support spares")]
    RaidZeroWithSpares,

    #[error("RAID '{0}' has duplicated devices in members and spares")]
    RaidDuplicatedDevices(String),

    #[error("Invalid special filesystem '{0}'")]
    InvalidSpecialFilesystem(String),

    #[error("Special device(s) missing mountpoint: {}", .0.join(", "))]
    UnmountedSpecialDevices(Vec<String>),

    #[error("Filesystem not found for device '{0}'")]
    FilesystemNotFound(String),

    #[error("Invalid size '{0}'")]
    InvalidSize(String),

    #[error("Invalid negative size '{0}'")]
    NegativeSize(String),

    #[error("Dependency cycle in layout: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),
}

/// A well-formed layout that does not match the target machine's actual
/// hardware.  Raised before any mutation, so the machine's existing
/// storage configuration survives the failure.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown machine disk(s): {}", .missing.join(", "))]
pub struct UnappliableLayout {
    /// Disk names the layout references but the machine lacks, sorted.
    pub missing: Vec<String>,
}
