// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed view of a simplestreams products document.
//!
//! The wire format is a nested dict: `content_id` → `products` →
//! `<product_name>` → `versions` → `<version_name>` → `items` →
//! `<item_name>`, with scalar metadata allowed at every level.  Field
//! names here are bit-exact wire contract with the image-publishing
//! service, including the hyphenated `bootloader-type` and `subarches` as
//! one comma-separated string.

use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Scalar metadata accepted at any level of a products document.  Fields
/// this code does not know about are dropped on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subarch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subarches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kflavor: Option<String>,
    #[serde(
        default,
        rename = "bootloader-type",
        skip_serializing_if = "Option::is_none"
    )]
    pub bootloader_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gadget_snap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_snap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_eol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gadget_title: Option<String>,
}

impl ItemFields {
    /// Layer `self` over `base`: a field set here wins, a field absent
    /// here falls back to `base`.
    fn merged_over(&self, base: &ItemFields) -> ItemFields {
        ItemFields {
            path: self.path.clone().or_else(|| base.path.clone()),
            sha256: self.sha256.clone().or_else(|| base.sha256.clone()),
            size: self.size.or(base.size),
            os: self.os.clone().or_else(|| base.os.clone()),
            release: self.release.clone().or_else(|| base.release.clone()),
            version: self.version.clone().or_else(|| base.version.clone()),
            arch: self.arch.clone().or_else(|| base.arch.clone()),
            subarch: self.subarch.clone().or_else(|| base.subarch.clone()),
            subarches: self
                .subarches
                .clone()
                .or_else(|| base.subarches.clone()),
            label: self.label.clone().or_else(|| base.label.clone()),
            kflavor: self.kflavor.clone().or_else(|| base.kflavor.clone()),
            bootloader_type: self
                .bootloader_type
                .clone()
                .or_else(|| base.bootloader_type.clone()),
            gadget_snap: self
                .gadget_snap
                .clone()
                .or_else(|| base.gadget_snap.clone()),
            kernel_snap: self
                .kernel_snap
                .clone()
                .or_else(|| base.kernel_snap.clone()),
            release_codename: self
                .release_codename
                .clone()
                .or_else(|| base.release_codename.clone()),
            release_title: self
                .release_title
                .clone()
                .or_else(|| base.release_title.clone()),
            support_eol: self
                .support_eol
                .clone()
                .or_else(|| base.support_eol.clone()),
            os_title: self.os_title.clone().or_else(|| base.os_title.clone()),
            gadget_title: self
                .gadget_title
                .clone()
                .or_else(|| base.gadget_title.clone()),
        }
    }
}

/// One downloadable file within a product version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// One dated build of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVersion {
    #[serde(default)]
    pub items: BTreeMap<String, Item>,
    #[serde(flatten)]
    pub fields: ItemFields,
}

/// One product: all its versions plus product-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub versions: BTreeMap<String, ProductVersion>,
    #[serde(flatten)]
    pub fields: ItemFields,
}

impl Product {
    /// The newest version by name.  Simplestreams version names are
    /// `YYYYMMDD[.N]` serials, so lexicographic order is age order.
    pub fn latest_version(&self) -> Option<(&str, &ProductVersion)> {
        self.versions
            .iter()
            .next_back()
            .map(|(name, version)| (name.as_str(), version))
    }
}

/// A whole products document, as published under one content id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductsDocument {
    pub content_id: String,
    #[serde(default)]
    pub products: BTreeMap<String, Product>,
    #[serde(flatten)]
    pub fields: ItemFields,
}

impl ProductsDocument {
    /// Flattened metadata for one item: scalars merge document-level
    /// downward with the innermost value winning, then the pedigree names
    /// are injected.
    pub fn exdata(
        &self,
        product_name: &str,
        version_name: &str,
        item_name: &str,
    ) -> Option<ItemExdata> {
        let product = self.products.get(product_name)?;
        let version = product.versions.get(version_name)?;
        let item = version.items.get(item_name)?;
        let fields = item
            .fields
            .merged_over(&version.fields)
            .merged_over(&product.fields)
            .merged_over(&self.fields);
        Some(ItemExdata {
            content_id: self.content_id.clone(),
            product_name: product_name.to_string(),
            version_name: version_name.to_string(),
            item_name: item_name.to_string(),
            fields,
        })
    }
}

/// One item with its merged metadata and full pedigree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemExdata {
    pub content_id: String,
    pub product_name: String,
    pub version_name: String,
    pub item_name: String,
    pub fields: ItemFields,
}

/// The cleaned record kept in the catalog: pedigree plus the known
/// simplestreams fields, everything else dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub content_id: String,
    pub product_name: String,
    pub version_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subarches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_codename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_eol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kflavor: Option<String>,
    #[serde(
        default,
        rename = "bootloader-type",
        skip_serializing_if = "Option::is_none"
    )]
    pub bootloader_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gadget_title: Option<String>,
}

impl ImageMetadata {
    pub fn from_exdata(exdata: &ItemExdata) -> Self {
        Self {
            content_id: exdata.content_id.clone(),
            product_name: exdata.product_name.clone(),
            version_name: exdata.version_name.clone(),
            path: exdata.fields.path.clone(),
            sha256: exdata.fields.sha256.clone(),
            size: exdata.fields.size,
            subarches: exdata.fields.subarches.clone(),
            release_codename: exdata.fields.release_codename.clone(),
            release_title: exdata.fields.release_title.clone(),
            support_eol: exdata.fields.support_eol.clone(),
            kflavor: exdata.fields.kflavor.clone(),
            bootloader_type: exdata.fields.bootloader_type.clone(),
            os_title: exdata.fields.os_title.clone(),
            gadget_title: exdata.fields.gadget_title.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn empty_for_tests() -> Self {
        Self {
            content_id: String::new(),
            product_name: String::new(),
            version_name: String::new(),
            path: None,
            sha256: None,
            size: None,
            subarches: None,
            release_codename: None,
            release_title: None,
            support_eol: None,
            kflavor: None,
            bootloader_type: None,
            os_title: None,
            gadget_title: None,
        }
    }
}
