// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content-addressed store for boot-resource files on a region's local disk.
//!
//! Every stored file lives in one flat directory and is named by a unique
//! prefix of its SHA-256 digest, so identical content uploaded under any
//! number of names occupies disk space once.  [`ImageStore`] owns the root
//! directory and hands out per-file handles; the handles carry the declared
//! digest and size and enforce them on every write path.
//!
//! Two variants of the file handle exist with byte-identical semantics: the
//! async [`LocalBootResourceFile`] used by download tasks, and the
//! [`blocking`] one used by synchronous chunked-upload handlers.

mod error;
mod extract;
mod file;
mod filename;
mod free_space;
mod lock;
mod verify;

pub mod blocking;

pub use error::StoreError;
pub use file::LocalBootResourceFile;
pub use file::StoreWriter;
pub use filename::MIN_FILENAME_PREFIX_LEN;
pub use filename::calculate_filename_on_disk;
pub use free_space::DiskSpace;
pub use free_space::disk_space;
pub use free_space::free_space;
pub use lock::LockFile;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use slog::Logger;
use std::io;

/// Handle to the on-disk boot-resource store of one region controller.
///
/// The store is a single flat directory; files are named by digest prefix
/// (see [`calculate_filename_on_disk`]) and bootloader archives are
/// unpacked into subdirectories next to them.  Constructing an `ImageStore`
/// performs no I/O: the root may not exist yet, and callers that intend to
/// write should call [`ImageStore::ensure_root`] first.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: Utf8PathBuf,
    log: Logger,
}

impl ImageStore {
    pub fn new(root: Utf8PathBuf, log: &Logger) -> Self {
        let log = log.new(slog::o!(
            "component" => "ImageStore",
            "root" => root.to_string(),
        ));
        Self { root, log }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Creates the store root (and parents) if missing.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Handle to one file in the store.  `filename_on_disk` is normally a
    /// digest prefix produced by [`calculate_filename_on_disk`]; the handle
    /// does not care how it was chosen.
    pub fn resource_file(
        &self,
        sha256: &str,
        filename_on_disk: &str,
        total_size: u64,
    ) -> LocalBootResourceFile {
        LocalBootResourceFile::new(
            &self.root,
            sha256,
            filename_on_disk,
            total_size,
            &self.log,
        )
    }

    /// Blocking counterpart of [`ImageStore::resource_file`].
    pub fn blocking_resource_file(
        &self,
        sha256: &str,
        filename_on_disk: &str,
        total_size: u64,
    ) -> blocking::LocalBootResourceFile {
        blocking::LocalBootResourceFile::new(
            &self.root,
            sha256,
            filename_on_disk,
            total_size,
            &self.log,
        )
    }

    /// Total bytes currently held under the store root, extracted
    /// bootloader trees included.  A missing root counts as empty.
    pub async fn used_space(&self) -> io::Result<u64> {
        let mut total = 0;
        let mut pending = vec![self.root.clone().into_std_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }
}
