// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The boot-image catalog: metadata records keyed by image spec.

use crate::model::ImageMetadata;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

/// Names one bootable image variant.  Immutable once built; the six
/// dimensions together are the catalog key.
///
/// `kflavor` is the literal `"bootloader"` for bootloader entries and
/// defaults to `"generic"` for items that do not declare one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSpec {
    pub os: String,
    pub arch: String,
    pub subarch: String,
    pub kflavor: String,
    pub release: String,
    pub label: String,
}

impl ImageSpec {
    pub fn new(
        os: &str,
        arch: &str,
        subarch: &str,
        kflavor: &str,
        release: &str,
        label: &str,
    ) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            subarch: subarch.to_string(),
            kflavor: kflavor.to_string(),
            release: release.to_string(),
            label: label.to_string(),
        }
    }
}

/// Image metadata keyed by [`ImageSpec`].
///
/// Plain `set` is last-write-wins; [`BootImageMapping::set_if_absent`] is
/// the compatibility-slot operation: the first item to claim a slot during
/// an ingestion run keeps it.  Iteration order is unspecified.
#[derive(Debug, Clone, Default)]
pub struct BootImageMapping {
    mapping: HashMap<ImageSpec, ImageMetadata>,
}

impl BootImageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the metadata for `spec`.
    pub fn set(&mut self, spec: ImageSpec, metadata: ImageMetadata) {
        self.mapping.insert(spec, metadata);
    }

    /// Inserts the metadata for `spec` only when the slot is empty.  An
    /// established entry is never replaced.
    pub fn set_if_absent(
        &mut self,
        spec: ImageSpec,
        metadata: ImageMetadata,
    ) {
        self.mapping.entry(spec).or_insert(metadata);
    }

    pub fn get(&self, spec: &ImageSpec) -> Option<&ImageMetadata> {
        self.mapping.get(spec)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ImageSpec, &ImageMetadata)> {
        self.mapping.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(version_name: &str) -> ImageMetadata {
        ImageMetadata {
            content_id: "com.ubuntu.maas:stable:v3:download".to_string(),
            product_name: "com.ubuntu.maas.stable:v3:boot:20.04:amd64:ga-20.04"
                .to_string(),
            version_name: version_name.to_string(),
            ..ImageMetadata::empty_for_tests()
        }
    }

    fn spec() -> ImageSpec {
        ImageSpec::new(
            "ubuntu",
            "amd64",
            "ga-20.04",
            "generic",
            "focal",
            "stable",
        )
    }

    #[test]
    fn set_replaces_existing_entries() {
        let mut mapping = BootImageMapping::new();
        mapping.set(spec(), metadata("20230901"));
        mapping.set(spec(), metadata("20231001"));
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get(&spec()).unwrap().version_name,
            "20231001"
        );
    }

    #[test]
    fn set_if_absent_keeps_the_first_entry() {
        let mut mapping = BootImageMapping::new();
        mapping.set_if_absent(spec(), metadata("20230901"));
        mapping.set_if_absent(spec(), metadata("20231001"));
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get(&spec()).unwrap().version_name,
            "20230901"
        );
    }

    #[test]
    fn distinct_specs_do_not_collide() {
        let mut mapping = BootImageMapping::new();
        let mut other = spec();
        other.subarch = "generic".to_string();
        mapping.set_if_absent(spec(), metadata("20230901"));
        mapping.set_if_absent(other.clone(), metadata("20231001"));
        assert_eq!(mapping.len(), 2);
        assert!(!mapping.is_empty());
        assert_eq!(mapping.iter().count(), 2);
        assert_eq!(
            mapping.get(&other).unwrap().version_name,
            "20231001"
        );
    }
}
