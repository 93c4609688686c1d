// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Catalog of bootable images known to a region, and the machinery that
//! builds it from simplestreams products documents.
//!
//! The catalog itself is a [`BootImageMapping`]: one [`ImageMetadata`]
//! record per [`ImageSpec`] slot, where a spec names an image variant by
//! `(os, arch, subarch, kflavor, release, label)`.  [`RepoDumper`] walks a
//! products document, validates each product with [`validate_product`] and
//! fills the mapping, expanding items across sub-architectures and keeping
//! the first write for every slot so compatibility aliases never get
//! silently promoted mid-run.

mod dumper;
mod mapping;
mod model;

pub use dumper::CatalogError;
pub use dumper::RepoDumper;
pub use dumper::validate_product;
pub use mapping::BootImageMapping;
pub use mapping::ImageSpec;
pub use model::ImageMetadata;
pub use model::Item;
pub use model::ItemExdata;
pub use model::ItemFields;
pub use model::Product;
pub use model::ProductVersion;
pub use model::ProductsDocument;
