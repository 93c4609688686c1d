// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The file-type taxonomy of boot-resource set contents.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Type of one file inside a boot-resource set, as named by the upstream
/// image catalog (`ftype` field).  The serialized names are wire contract
/// and must not drift.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub enum BootResourceFileType {
    #[serde(rename = "boot-kernel")]
    BootKernel,
    #[serde(rename = "boot-initrd")]
    BootInitrd,
    #[serde(rename = "boot-dtb")]
    BootDtb,
    #[serde(rename = "root-tgz")]
    RootTgz,
    #[serde(rename = "root-tbz")]
    RootTbz,
    #[serde(rename = "root-txz")]
    RootTxz,
    #[serde(rename = "root-dd")]
    RootDd,
    #[serde(rename = "root-dd.tar")]
    RootDdTar,
    #[serde(rename = "root-dd.raw")]
    RootDdRaw,
    #[serde(rename = "root-dd.tar.gz")]
    RootDdTgz,
    #[serde(rename = "root-dd.tar.bz2")]
    RootDdTbz,
    #[serde(rename = "root-dd.tar.xz")]
    RootDdTxz,
    #[serde(rename = "root-dd.bz2")]
    RootDdBz2,
    #[serde(rename = "root-dd.gz")]
    RootDdGz,
    #[serde(rename = "root-dd.xz")]
    RootDdXz,
    #[serde(rename = "root-image.gz")]
    RootImage,
    #[serde(rename = "squashfs")]
    SquashfsImage,
    #[serde(rename = "archive.tar.xz")]
    ArchiveTarXz,
}

impl BootResourceFileType {
    /// The upstream catalog name for this file type.
    pub fn wire_name(&self) -> &'static str {
        match self {
            BootResourceFileType::BootKernel => "boot-kernel",
            BootResourceFileType::BootInitrd => "boot-initrd",
            BootResourceFileType::BootDtb => "boot-dtb",
            BootResourceFileType::RootTgz => "root-tgz",
            BootResourceFileType::RootTbz => "root-tbz",
            BootResourceFileType::RootTxz => "root-txz",
            BootResourceFileType::RootDd => "root-dd",
            BootResourceFileType::RootDdTar => "root-dd.tar",
            BootResourceFileType::RootDdRaw => "root-dd.raw",
            BootResourceFileType::RootDdTgz => "root-dd.tar.gz",
            BootResourceFileType::RootDdTbz => "root-dd.tar.bz2",
            BootResourceFileType::RootDdTxz => "root-dd.tar.xz",
            BootResourceFileType::RootDdBz2 => "root-dd.bz2",
            BootResourceFileType::RootDdGz => "root-dd.gz",
            BootResourceFileType::RootDdXz => "root-dd.xz",
            BootResourceFileType::RootImage => "root-image.gz",
            BootResourceFileType::SquashfsImage => "squashfs",
            BootResourceFileType::ArchiveTarXz => "archive.tar.xz",
        }
    }

    /// True for file types that provide a bootable kernel.
    pub fn is_kernel_class(&self) -> bool {
        matches!(self, BootResourceFileType::BootKernel)
    }

    /// True for file types that can serve as the root filesystem of a
    /// deployed machine.  Device-tree blobs and the raw dd images are not
    /// roots in this sense.
    pub fn is_usable_root(&self) -> bool {
        matches!(
            self,
            BootResourceFileType::SquashfsImage
                | BootResourceFileType::RootImage
                | BootResourceFileType::RootTgz
                | BootResourceFileType::RootTbz
                | BootResourceFileType::RootTxz
        )
    }

    /// True for the tarball family consumed by the legacy fast-path
    /// installer.
    pub fn is_xinstall_root(&self) -> bool {
        matches!(
            self,
            BootResourceFileType::RootTgz
                | BootResourceFileType::RootTbz
                | BootResourceFileType::RootTxz
        )
    }

    /// Maps the short type string accepted from operator uploads to a file
    /// type.  Returns `None` for strings the upload API does not accept.
    pub fn from_upload_type(upload_type: &str) -> Option<Self> {
        match upload_type {
            "tgz" => Some(BootResourceFileType::RootTgz),
            "tbz" => Some(BootResourceFileType::RootTbz),
            "txz" => Some(BootResourceFileType::RootTxz),
            "ddtgz" => Some(BootResourceFileType::RootDdTgz),
            "ddtar" => Some(BootResourceFileType::RootDdTar),
            "ddraw" => Some(BootResourceFileType::RootDdRaw),
            "ddtbz" => Some(BootResourceFileType::RootDdTbz),
            "ddtxz" => Some(BootResourceFileType::RootDdTxz),
            "ddbz2" => Some(BootResourceFileType::RootDdBz2),
            "ddgz" => Some(BootResourceFileType::RootDdGz),
            "ddxz" => Some(BootResourceFileType::RootDdXz),
            _ => None,
        }
    }

    /// The filename under which an uploaded file of this type is stored in
    /// its resource set.
    pub fn uploaded_filename(&self) -> &'static str {
        match self {
            BootResourceFileType::RootTgz => "root.tgz",
            BootResourceFileType::RootTbz => "root.tbz",
            BootResourceFileType::RootTxz => "root.txz",
            other => other.wire_name(),
        }
    }
}

impl fmt::Display for BootResourceFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_serde() {
        for ftype in [
            BootResourceFileType::BootKernel,
            BootResourceFileType::RootDdTgz,
            BootResourceFileType::SquashfsImage,
            BootResourceFileType::ArchiveTarXz,
        ] {
            let json = serde_json::to_string(&ftype).unwrap();
            assert_eq!(json, format!("\"{}\"", ftype.wire_name()));
            let back: BootResourceFileType =
                serde_json::from_str(&json).unwrap();
            assert_eq!(back, ftype);
        }
    }

    #[test]
    fn squashfs_is_usable_root_but_not_xinstall() {
        let ftype = BootResourceFileType::SquashfsImage;
        assert!(ftype.is_usable_root());
        assert!(!ftype.is_xinstall_root());
    }

    #[test]
    fn dtb_is_not_a_root() {
        let ftype = BootResourceFileType::BootDtb;
        assert!(!ftype.is_usable_root());
        assert!(!ftype.is_xinstall_root());
        assert!(!ftype.is_kernel_class());
    }

    #[test]
    fn every_upload_type_maps() {
        let accepted = [
            "tgz", "tbz", "txz", "ddtgz", "ddtar", "ddraw", "ddtbz", "ddtxz",
            "ddbz2", "ddgz", "ddxz",
        ];
        for upload_type in accepted {
            assert!(
                BootResourceFileType::from_upload_type(upload_type).is_some(),
                "upload type {upload_type} did not map"
            );
        }
        assert!(BootResourceFileType::from_upload_type("iso").is_none());
    }

    #[test]
    fn uploaded_tarballs_get_canonical_names() {
        assert_eq!(
            BootResourceFileType::RootTgz.uploaded_filename(),
            "root.tgz"
        );
        assert_eq!(
            BootResourceFileType::RootDdRaw.uploaded_filename(),
            "root-dd.raw"
        );
    }
}
