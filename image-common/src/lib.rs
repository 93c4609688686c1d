// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared vocabulary for the boot-resource sync engine: the file-type
//! taxonomy of resource-set contents and the parameter types exchanged with
//! the workflow orchestrator.

mod filetype;
mod params;

pub use filetype::BootResourceFileType;
pub use params::DISK_TIMEOUT;
pub use params::DOWNLOAD_TIMEOUT;
pub use params::HEARTBEAT_TIMEOUT;
pub use params::MAX_SOURCES;
pub use params::REPORT_INTERVAL;
pub use params::ResourceDeleteParam;
pub use params::ResourceDownloadParam;
pub use params::ResourceIdentifier;
pub use params::SpaceRequirementError;
pub use params::SpaceRequirementParam;
pub use params::merge_download_params;
