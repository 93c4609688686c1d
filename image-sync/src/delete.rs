// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removes boot-resource files that no resource set references anymore.

use crate::download::LOCK_POLL_INTERVAL;
use image_common::ResourceDeleteParam;
use image_store::ImageStore;
use image_store::LockFile;
use image_store::StoreError;
use slog::Logger;
use slog::info;

/// Deletes every file named in `param` from the store.
///
/// Each file is unlinked under its per-file lock so an in-flight
/// download of the same content finishes (or aborts) first.  Files
/// already absent are skipped silently; deletion must be idempotent
/// because the orchestrator retries it.
pub async fn delete_resource_files(
    log: &Logger,
    store: &ImageStore,
    param: &ResourceDeleteParam,
) -> Result<(), StoreError> {
    store.ensure_root().await?;
    for file in &param.files {
        let lfile =
            store.resource_file(&file.sha256, &file.filename_on_disk, 0);
        let lock = loop {
            match LockFile::try_acquire(lfile.path())? {
                Some(lock) => break lock,
                None => tokio::time::sleep(LOCK_POLL_INTERVAL).await,
            }
        };
        lfile.unlink().await?;
        info!(
            log, "deleted boot resource file";
            "filename" => &file.filename_on_disk,
        );

        let lock_path = lock.path().to_owned();
        drop(lock);
        // Best effort: a worker racing for the same file may have
        // re-created the lock already.
        let _ = tokio::fs::remove_file(&lock_path).await;
    }
    Ok(())
}
