// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parameter types exchanged with the sync orchestrator.  Field names are
//! wire contract.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// How often a download worker reports synced bytes back to the region.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// Heartbeat deadline for a download worker; one heartbeat per chunk.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for a disk-space check.
pub const DISK_TIMEOUT: Duration = Duration::from_secs(15 * 60);
/// Deadline for a single file download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
/// Upper bound on the number of alternative sources offered for one fetch.
pub const MAX_SOURCES: usize = 5;

/// Everything a worker needs to fetch one distinct file.  A single content
/// blob may back several resource-file records; they all ride in
/// `rfile_ids` and are reported together.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct ResourceDownloadParam {
    pub rfile_ids: Vec<i64>,
    pub source_list: Vec<String>,
    pub sha256: String,
    pub filename_on_disk: String,
    pub total_size: u64,
    #[serde(default)]
    pub extract_paths: Vec<String>,
    #[serde(default)]
    pub http_proxy: Option<String>,
}

/// Folds download params that share a `sha256` into a single param whose
/// `rfile_ids`, `source_list` and `extract_paths` are the concatenation, in
/// first-seen order.  The file is fetched once and accounted to every
/// record.
pub fn merge_download_params(
    params: Vec<ResourceDownloadParam>,
) -> Vec<ResourceDownloadParam> {
    let mut merged: Vec<ResourceDownloadParam> = Vec::new();
    let mut by_sha: HashMap<String, usize> = HashMap::new();
    for param in params {
        match by_sha.get(&param.sha256) {
            Some(&idx) => {
                let existing = &mut merged[idx];
                existing.rfile_ids.extend(param.rfile_ids);
                existing.source_list.extend(param.source_list);
                existing.extract_paths.extend(param.extract_paths);
            }
            None => {
                by_sha.insert(param.sha256.clone(), merged.len());
                merged.push(param);
            }
        }
    }
    merged
}

/// Identifies one stored file for deletion.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct ResourceIdentifier {
    pub sha256: String,
    pub filename_on_disk: String,
}

/// Files whose content is no longer referenced by any resource set.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct ResourceDeleteParam {
    pub files: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("only one of min_free_space and total_resources_size can be set")]
pub struct SpaceRequirementError;

/// A disk-space requirement, expressed either as an absolute floor of free
/// bytes or as the total size of the resources about to be fetched.  The
/// two measures are mutually exclusive.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(try_from = "RawSpaceRequirementParam")]
pub struct SpaceRequirementParam {
    min_free_space: Option<u64>,
    total_resources_size: Option<u64>,
}

impl SpaceRequirementParam {
    /// Requires at least `bytes` of free space, unconditionally.
    pub fn min_free_space(bytes: u64) -> Self {
        Self { min_free_space: Some(bytes), total_resources_size: None }
    }

    /// Requires enough free space to hold `bytes` of resources, minus
    /// whatever portion is already on disk.
    pub fn total_resources_size(bytes: u64) -> Self {
        Self { min_free_space: None, total_resources_size: Some(bytes) }
    }

    pub fn min_free_space_bytes(&self) -> Option<u64> {
        self.min_free_space
    }

    pub fn total_resources_size_bytes(&self) -> Option<u64> {
        self.total_resources_size
    }
}

#[derive(Deserialize)]
struct RawSpaceRequirementParam {
    #[serde(default)]
    min_free_space: Option<u64>,
    #[serde(default)]
    total_resources_size: Option<u64>,
}

impl TryFrom<RawSpaceRequirementParam> for SpaceRequirementParam {
    type Error = SpaceRequirementError;

    fn try_from(
        raw: RawSpaceRequirementParam,
    ) -> Result<Self, Self::Error> {
        if raw.min_free_space.is_some() && raw.total_resources_size.is_some()
        {
            return Err(SpaceRequirementError);
        }
        Ok(Self {
            min_free_space: raw.min_free_space,
            total_resources_size: raw.total_resources_size,
        })
    }
}
