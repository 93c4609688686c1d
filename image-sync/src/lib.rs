// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot-resource synchronization across regions.
//!
//! The pieces fit together like this: [`ResourceSetInventory`] tracks
//! which region holds how much of which file, [`plan_sync`] turns that
//! picture into per-region download jobs, and the activity functions
//! ([`download_resource_file`], [`check_disk_space`],
//! [`delete_resource_files`]) execute those jobs against a local
//! [`image_store::ImageStore`].

mod delete;
mod download;
mod inventory;
mod planner;
mod space;

pub use delete::delete_resource_files;
pub use download::DownloadError;
pub use download::ProgressReporter;
pub use download::download_resource_file;
pub use inventory::BootResource;
pub use inventory::BootResourceSet;
pub use inventory::ResourceFile;
pub use inventory::ResourceSetInventory;
pub use inventory::SyncError;
pub use planner::FetchJob;
pub use planner::SyncPlan;
pub use planner::plan_sync;
pub use space::check_disk_space;
