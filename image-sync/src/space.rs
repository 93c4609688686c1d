// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pre-sync disk space check.

use image_common::SpaceRequirementParam;
use image_store::ImageStore;
use image_store::StoreError;
use image_store::free_space;
use slog::Logger;
use slog::warn;

/// Whether the filesystem holding the store can absorb the requirement.
///
/// A total-resources-size requirement is offset by the bytes the store
/// already holds, so a fully synced store passes even on a nearly full
/// disk.  The comparison is strict: a byte-for-byte fit is rejected.
pub async fn check_disk_space(
    log: &Logger,
    store: &ImageStore,
    param: &SpaceRequirementParam,
) -> Result<bool, StoreError> {
    store.ensure_root().await?;

    let required = match param.total_resources_size_bytes() {
        Some(total) => total.saturating_sub(store.used_space().await?),
        None => param.min_free_space_bytes().unwrap_or(0),
    };

    let root = store.root().to_owned();
    let free = tokio::task::spawn_blocking(move || free_space(&root))
        .await
        .map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e)
        })??;

    let ok = free > required;
    if !ok {
        warn!(
            log, "not enough disk space to sync boot resources";
            "free" => free,
            "required" => required,
        );
    }
    Ok(ok)
}
