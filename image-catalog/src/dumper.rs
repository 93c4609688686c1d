// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Walks simplestreams products documents and fills the boot-image
//! catalog, expanding each accepted item across its sub-architectures.

use crate::mapping::BootImageMapping;
use crate::mapping::ImageSpec;
use crate::model::ImageMetadata;
use crate::model::ItemExdata;
use crate::model::ItemFields;
use crate::model::ProductsDocument;
use regex::Regex;
use regex::RegexBuilder;
use slog::Logger;
use slog::debug;
use slog::error;
use std::io;
use std::sync::LazyLock;
use thiserror::Error;

/// Product-name schemes accepted per OS family.  Plain ubuntu kernels are
/// published under v2/v3 (v3 may carry a `+platform` suffix); ubuntu-core
/// is exactly v4; bootloader firmware is version 1.
static UBUNTU_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r".*:v([23]|3\+platform):.*")
        .case_insensitive(true)
        .build()
        .unwrap()
});
static UBUNTU_CORE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r".*:v4:.*").case_insensitive(true).build().unwrap()
});
static BOOTLOADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r".*:1:.*").case_insensitive(true).build().unwrap()
});

/// Sub-architectures naming a hardware-enablement kernel: the legacy
/// letter scheme (`hwe-p`) and the year.month schemes (`hwe-16.04`,
/// `ga-16.04`).
static HWE_SUBARCH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:hwe|ga)-(?:[a-z]|\d\d\.\d\d)$").unwrap()
});

/// The bootloader images the standard streams publish, as
/// `(os, bootloader-type, arch)`.  Anything else is rejected.
const SUPPORTED_BOOTLOADERS: &[(&str, &str, &str)] = &[
    ("pxelinux", "pxe", "i386"),
    ("grub-efi-signed", "uefi", "amd64"),
    ("grub-efi", "uefi", "arm64"),
    ("grub-ieee1275", "open-firmware", "ppc64el"),
];

/// Whether a product should enter the catalog.  Known OS families must
/// match their version scheme; bootloaders must additionally be one of
/// the supported `(os, bootloader-type, arch)` combinations.  Products
/// from OS families this code has no rule for pass through unchanged.
pub fn validate_product(fields: &ItemFields, product_name: &str) -> bool {
    if let Some(bootloader_type) = fields.bootloader_type.as_deref() {
        let os = fields.os.as_deref().unwrap_or("");
        let arch = fields.arch.as_deref().unwrap_or("");
        return BOOTLOADER_REGEX.is_match(product_name)
            && SUPPORTED_BOOTLOADERS.iter().any(|(b_os, b_type, b_arch)| {
                os == *b_os && bootloader_type == *b_type && arch == *b_arch
            });
    }
    let os = fields.os.as_deref().unwrap_or("");
    if os.starts_with("ubuntu-core") {
        UBUNTU_CORE_REGEX.is_match(product_name)
    } else if os == "ubuntu" {
        UBUNTU_REGEX.is_match(product_name)
    } else {
        true
    }
}

/// Failure while streaming a products document.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error while syncing boot images")]
    Sync(#[source] serde_json::Error),
}

/// Fills a [`BootImageMapping`] from products documents.
///
/// Every insertion is first-write-wins so the compatibility slots (the
/// `generic` alias for hardware-enablement kernels in particular) stick
/// with the first item that claimed them, regardless of how many newer
/// variants follow in the same run.  The borrowed mapping accumulates
/// across `sync` calls, one call per content-id document.
pub struct RepoDumper<'a> {
    mapping: &'a mut BootImageMapping,
    validate_products: bool,
    log: Logger,
}

impl<'a> RepoDumper<'a> {
    pub fn new(log: &Logger, mapping: &'a mut BootImageMapping) -> Self {
        Self::with_validation(log, mapping, true)
    }

    /// Validation is only ever disabled for mirrors of already-trusted
    /// content.
    pub fn with_validation(
        log: &Logger,
        mapping: &'a mut BootImageMapping,
        validate_products: bool,
    ) -> Self {
        Self {
            mapping,
            validate_products,
            log: log.new(slog::o!("component" => "RepoDumper")),
        }
    }

    /// Reads one products document and inserts every item of the latest
    /// version of each product.
    pub fn sync<R: io::Read>(
        &mut self,
        reader: R,
    ) -> Result<(), CatalogError> {
        let document: ProductsDocument =
            match serde_json::from_reader(reader) {
                Ok(document) => document,
                Err(err) => {
                    error!(
                        self.log, "I/O error while syncing boot images";
                        "error" => %err,
                    );
                    return Err(CatalogError::Sync(err));
                }
            };
        for (product_name, product) in &document.products {
            let Some((version_name, version)) = product.latest_version()
            else {
                continue;
            };
            for item_name in version.items.keys() {
                if let Some(exdata) =
                    document.exdata(product_name, version_name, item_name)
                {
                    self.insert_item(&exdata);
                }
            }
        }
        Ok(())
    }

    /// Folds one item into the mapping.  Invalid or incomplete items are
    /// dropped without error; upstream catalogs routinely list products
    /// this deployment does not support.
    pub fn insert_item(&mut self, exdata: &ItemExdata) {
        let fields = &exdata.fields;
        if self.validate_products
            && !validate_product(fields, &exdata.product_name)
        {
            debug!(
                self.log, "dropped unsupported product";
                "product" => &exdata.product_name,
            );
            return;
        }

        // Products published before the os field existed are all Ubuntu.
        let os = fields.os.as_deref().unwrap_or("ubuntu");
        let (Some(arch), Some(label)) =
            (fields.arch.as_deref(), fields.label.as_deref())
        else {
            debug!(
                self.log, "dropped item without arch or label";
                "product" => &exdata.product_name,
            );
            return;
        };
        let metadata = ImageMetadata::from_exdata(exdata);

        // Bootloader firmware: the bootloader type stands in for the
        // release dimension.
        if let Some(bootloader_type) = fields.bootloader_type.as_deref() {
            let Some(subarches) = fields.subarches.as_deref() else {
                debug!(
                    self.log, "dropped bootloader without subarches";
                    "product" => &exdata.product_name,
                );
                return;
            };
            for subarch in subarches.split(',') {
                self.mapping.set_if_absent(
                    ImageSpec::new(
                        os,
                        arch,
                        subarch,
                        "bootloader",
                        bootloader_type,
                        label,
                    ),
                    metadata.clone(),
                );
            }
            return;
        }

        let Some(release) = fields.release.as_deref() else {
            debug!(
                self.log, "dropped item without release";
                "product" => &exdata.product_name,
            );
            return;
        };

        // Ubuntu Core images collapse onto a single generic slot; the
        // gadget rides in the release dimension and the kernel snap in
        // kflavor.
        if os.starts_with("ubuntu-core") {
            let gadget = fields.gadget_snap.as_deref().unwrap_or("generic");
            let kernel = fields.kernel_snap.as_deref().unwrap_or("generic");
            let release = format!("{release}-{gadget}");
            self.mapping.set_if_absent(
                ImageSpec::new(os, arch, "generic", kernel, &release, label),
                metadata,
            );
            return;
        }

        let kflavor = fields.kflavor.as_deref().unwrap_or("generic");
        let Some(subarches) =
            fields.subarches.as_deref().or(fields.subarch.as_deref())
        else {
            debug!(
                self.log, "dropped item without subarches";
                "product" => &exdata.product_name,
            );
            return;
        };
        for subarch in subarches.split(',') {
            self.mapping.set_if_absent(
                ImageSpec::new(os, arch, subarch, kflavor, release, label),
                metadata.clone(),
            );
        }

        // Hardware-enablement kernels double as the generic kernel for
        // their release.  The first variant seen keeps the generic slot:
        // it is the most broadly compatible one, not the newest.
        if os == "ubuntu" && fields.version.is_some() {
            if let Some(subarch) = fields.subarch.as_deref() {
                if HWE_SUBARCH_REGEX.is_match(subarch) {
                    self.mapping.set_if_absent(
                        ImageSpec::new(
                            os, arch, "generic", kflavor, release, label,
                        ),
                        metadata,
                    );
                }
            }
        }
    }
}
