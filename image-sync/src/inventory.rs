// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory projection of the boot-resource inventory and the
//! completeness computations over it.
//!
//! A boot resource (say, `ubuntu/focal` on amd64) owns dated resource
//! sets; a set owns files; every file is accounted per region.  All the
//! read operations here are pure projections, cheap enough to sit behind
//! a polled status endpoint: progress reads may run concurrently with
//! sync-count updates and can under-report, never over-report.

use image_common::BootResourceFileType;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("no boot resource with id {0}")]
    UnknownResource(i64),
    #[error("no resource set with id {0}")]
    UnknownSet(i64),
    #[error("no resource file with id {0}")]
    UnknownFile(i64),
}

/// One selectable image, e.g. `ubuntu/focal` on one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootResource {
    pub id: i64,
    pub name: String,
}

/// One dated build of a resource.  Ids are allocated in creation order,
/// so a higher id is a newer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootResourceSet {
    pub id: i64,
    pub resource_id: i64,
    pub version: String,
    pub label: String,
}

/// One file of a set.  `filename_on_disk` is the digest-prefix name the
/// content lives under in every region's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    pub id: i64,
    pub set_id: i64,
    pub filetype: BootResourceFileType,
    pub sha256: String,
    pub filename_on_disk: String,
    pub size: u64,
}

/// The inventory one region keeps current: resources, sets, files, and
/// per-`(file, region)` synced byte counts.
#[derive(Debug, Clone, Default)]
pub struct ResourceSetInventory {
    regions: BTreeSet<String>,
    resources: BTreeMap<i64, BootResource>,
    sets: BTreeMap<i64, BootResourceSet>,
    files: BTreeMap<i64, ResourceFile>,
    synced: BTreeMap<i64, BTreeMap<String, u64>>,
    next_id: i64,
}

impl ResourceSetInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&mut self, region_id: &str) {
        self.regions.insert(region_id.to_string());
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(String::as_str)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_resource(&mut self, name: &str) -> i64 {
        let id = self.next_id();
        self.resources
            .insert(id, BootResource { id, name: name.to_string() });
        id
    }

    pub fn add_set(
        &mut self,
        resource_id: i64,
        version: &str,
        label: &str,
    ) -> Result<i64, SyncError> {
        if !self.resources.contains_key(&resource_id) {
            return Err(SyncError::UnknownResource(resource_id));
        }
        let id = self.next_id();
        self.sets.insert(
            id,
            BootResourceSet {
                id,
                resource_id,
                version: version.to_string(),
                label: label.to_string(),
            },
        );
        Ok(id)
    }

    /// Adds a file to a set.  The on-disk name is derived here so that
    /// every distinct digest gets a unique prefix across the whole
    /// inventory, and identical content entered twice reuses its name.
    pub fn add_file(
        &mut self,
        set_id: i64,
        filetype: BootResourceFileType,
        sha256: &str,
        size: u64,
    ) -> Result<i64, SyncError> {
        if !self.sets.contains_key(&set_id) {
            return Err(SyncError::UnknownSet(set_id));
        }
        let filename_on_disk = self.filename_on_disk(sha256);
        let id = self.next_id();
        self.files.insert(
            id,
            ResourceFile {
                id,
                set_id,
                filetype,
                sha256: sha256.to_string(),
                filename_on_disk,
                size,
            },
        );
        Ok(id)
    }

    /// The store name for content with this digest, accounting for every
    /// digest already tracked.
    pub fn filename_on_disk(&self, sha256: &str) -> String {
        image_store::calculate_filename_on_disk(
            sha256,
            self.files.values().map(|f| {
                (f.sha256.as_str(), f.filename_on_disk.as_str())
            }),
        )
    }

    pub fn resource(&self, id: i64) -> Option<&BootResource> {
        self.resources.get(&id)
    }

    pub fn set(&self, id: i64) -> Option<&BootResourceSet> {
        self.sets.get(&id)
    }

    pub fn file(&self, id: i64) -> Option<&ResourceFile> {
        self.files.get(&id)
    }

    pub fn files_in_set(
        &self,
        set_id: i64,
    ) -> impl Iterator<Item = &ResourceFile> {
        self.files.values().filter(move |f| f.set_id == set_id)
    }

    /// Records the bytes a region currently holds for a file.  Reports
    /// are absolute, not deltas; a failed download reports 0 to reset
    /// its slot.
    pub fn record_synced(
        &mut self,
        file_id: i64,
        region_id: &str,
        size: u64,
    ) -> Result<(), SyncError> {
        if !self.files.contains_key(&file_id) {
            return Err(SyncError::UnknownFile(file_id));
        }
        self.synced
            .entry(file_id)
            .or_default()
            .insert(region_id.to_string(), size);
        Ok(())
    }

    pub fn synced_size(&self, file_id: i64, region_id: &str) -> u64 {
        self.synced
            .get(&file_id)
            .and_then(|per_region| per_region.get(region_id))
            .copied()
            .unwrap_or(0)
    }

    fn synced_total(&self, file_id: i64) -> u64 {
        self.synced
            .get(&file_id)
            .map(|per_region| per_region.values().sum())
            .unwrap_or(0)
    }

    fn set_files(
        &self,
        set_id: i64,
    ) -> Result<Vec<&ResourceFile>, SyncError> {
        if !self.sets.contains_key(&set_id) {
            return Err(SyncError::UnknownSet(set_id));
        }
        Ok(self.files.values().filter(|f| f.set_id == set_id).collect())
    }

    /// Percentage of the set synced across the whole fleet.  Integer
    /// sums with a single final division, so a fully synced set lands on
    /// exactly `100.0`; a set with no files (or no bytes, or no regions)
    /// reports `0.0`.
    pub fn sync_progress(&self, set_id: i64) -> Result<f64, SyncError> {
        let files = self.set_files(set_id)?;
        let total: u64 = files.iter().map(|f| f.size).sum();
        let expected = total * self.regions.len() as u64;
        if expected == 0 {
            return Ok(0.0);
        }
        let synced: u64 =
            files.iter().map(|f| self.synced_total(f.id)).sum();
        Ok(100.0 * synced as f64 / expected as f64)
    }

    /// Exact integer test for full sync; agrees with
    /// `sync_progress == 100.0`.
    pub fn is_sync_complete(&self, set_id: i64) -> Result<bool, SyncError> {
        let files = self.set_files(set_id)?;
        let total: u64 = files.iter().map(|f| f.size).sum();
        let expected = total * self.regions.len() as u64;
        if expected == 0 {
            return Ok(false);
        }
        let synced: u64 =
            files.iter().map(|f| self.synced_total(f.id)).sum();
        Ok(synced == expected)
    }

    /// The newest fully-synced set of a resource, if any.
    pub fn latest_complete_set(
        &self,
        resource_id: i64,
    ) -> Result<Option<&BootResourceSet>, SyncError> {
        if !self.resources.contains_key(&resource_id) {
            return Err(SyncError::UnknownResource(resource_id));
        }
        for set in self
            .sets
            .values()
            .rev()
            .filter(|s| s.resource_id == resource_id)
        {
            if self.is_sync_complete(set.id)? {
                return Ok(Some(set));
            }
        }
        Ok(None)
    }

    /// Whether the set can boot a machine: at least one kernel-class
    /// file and at least one usable root filesystem.
    pub fn is_usable(&self, set_id: i64) -> Result<bool, SyncError> {
        let files = self.set_files(set_id)?;
        let has_kernel =
            files.iter().any(|f| f.filetype.is_kernel_class());
        let has_root = files.iter().any(|f| f.filetype.is_usable_root());
        Ok(has_kernel && has_root)
    }

    /// Whether the set carries a root tarball the fast-path installer
    /// can unpack directly.
    pub fn is_xinstallable(&self, set_id: i64) -> Result<bool, SyncError> {
        let files = self.set_files(set_id)?;
        Ok(files.iter().any(|f| f.filetype.is_xinstall_root()))
    }

    /// Sets of a resource made redundant by a newer complete set,
    /// oldest last.  Everything down to and including the newest
    /// complete set is kept; with no complete set nothing is
    /// supersedable.
    pub fn supersedable_sets(
        &self,
        resource_id: i64,
    ) -> Result<Vec<i64>, SyncError> {
        if !self.resources.contains_key(&resource_id) {
            return Err(SyncError::UnknownResource(resource_id));
        }
        let mut deletable = Vec::new();
        let mut seen_complete = false;
        for set in self
            .sets
            .values()
            .rev()
            .filter(|s| s.resource_id == resource_id)
        {
            if seen_complete {
                deletable.push(set.id);
            } else if self.is_sync_complete(set.id)? {
                seen_complete = true;
            }
        }
        Ok(deletable)
    }
}
