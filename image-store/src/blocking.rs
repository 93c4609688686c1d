// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blocking variant of the local boot-resource file, for synchronous
//! chunked-upload handlers.  Semantics are byte-identical to the async
//! variant in [`crate::file`]; the shared rules live in [`crate::verify`].

use crate::error::StoreError;
use crate::extract;
use crate::free_space::free_space;
use crate::verify;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use sha2::Digest;
use sha2::Sha256;
use slog::Logger;
use slog::debug;
use slog::info;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Write;

/// Blocking handle to one content-addressed file in the store.
#[derive(Debug, Clone)]
pub struct LocalBootResourceFile {
    sha256: String,
    filename_on_disk: String,
    total_size: u64,
    root: Utf8PathBuf,
    path: Utf8PathBuf,
    log: Logger,
}

impl LocalBootResourceFile {
    pub(crate) fn new(
        root: &Utf8Path,
        sha256: &str,
        filename_on_disk: &str,
        total_size: u64,
        log: &Logger,
    ) -> Self {
        Self {
            sha256: sha256.to_string(),
            filename_on_disk: filename_on_disk.to_string(),
            total_size,
            root: root.to_owned(),
            path: root.join(filename_on_disk),
            log: log.new(slog::o!(
                "file" => filename_on_disk.to_string(),
            )),
        }
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn filename_on_disk(&self) -> &str {
        &self.filename_on_disk
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Bytes currently on disk; 0 when the file does not exist.
    pub fn size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether every declared byte is on disk.
    pub fn complete(&self) -> bool {
        self.size() == self.total_size
    }

    /// Whether the on-disk content is complete and hashes to the declared
    /// digest.  Incomplete or mismatched content is `false`, not an error.
    pub fn valid(&self) -> Result<bool, StoreError> {
        if !self.complete() {
            return Ok(false);
        }
        let mut file = std::fs::File::open(&self.path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; verify::HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let computed = hex::encode(hasher.finalize());
        Ok(verify::digest_matches(&self.sha256, &computed))
    }

    /// Removes the file.  Absence is not an error.
    pub fn unlink(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(self.log, "removed file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Opens a scoped writer positioned at the current end of file.  See
    /// the async counterpart for the commit contract.
    pub fn store(&self) -> Result<StoreWriter<'_>, StoreError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let position = file.metadata()?.len();
        Ok(StoreWriter { lfile: self, file, position })
    }

    /// Appends one chunk, opening and closing the file around it.  Refuses
    /// (before writing) chunks that would exceed the declared total, so an
    /// interrupted upload can always be continued from the current size.
    pub fn append_chunk(&self, chunk: &[u8]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let current = file.metadata()?.len();
        verify::admit_chunk(current, self.total_size, chunk.len() as u64)?;
        file.write_all(chunk).map_err(verify::map_write_error)?;
        file.flush().map_err(verify::map_write_error)?;
        Ok(())
    }

    /// Unpacks the stored file, treated as a tar archive, into
    /// `<store root>/<target_subdir>`.  Not hash-gated; callers validate
    /// first.
    pub fn extract_file(
        &self,
        target_subdir: &str,
    ) -> Result<(), StoreError> {
        let dest = self.root.join(target_subdir);
        info!(self.log, "extracting archive"; "target" => dest.as_str());
        extract::unpack_archive(&self.path, &dest)?;
        Ok(())
    }
}

/// Scoped writer returned by [`LocalBootResourceFile::store`].
pub struct StoreWriter<'a> {
    lfile: &'a LocalBootResourceFile,
    file: std::fs::File,
    position: u64,
}

impl StoreWriter<'_> {
    /// Appends `chunk` at the current position.  Free space is probed
    /// before every write; a write that lands past the declared total
    /// leaves the file truncated to exactly that total and fails.
    pub fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        let needed = chunk.len() as u64;
        let available = free_space(&self.lfile.root)?;
        if available < needed {
            return Err(StoreError::AllocationFail);
        }

        self.file.write_all(chunk).map_err(verify::map_write_error)?;
        self.position += needed;

        if let Some(target) =
            verify::truncation_after_write(self.position, self.lfile.total_size)
        {
            self.file.set_len(target)?;
        }
        verify::overflow_after_write(self.position, self.lfile.total_size)
    }

    /// Bytes the file held when the writer was opened plus bytes written
    /// since.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Finishes the scope: an incomplete file is deleted and reported as a
    /// size mismatch; a complete file with the wrong digest is deleted and
    /// reported as an invalid hash.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        let lfile = self.lfile;
        drop(self.file);

        if !lfile.complete() {
            lfile.unlink()?;
            return Err(StoreError::SizeMismatch);
        }
        if !lfile.valid()? {
            lfile.unlink()?;
            return Err(StoreError::InvalidHash);
        }
        info!(lfile.log, "stored file";
            "size" => lfile.total_size,
        );
        Ok(())
    }
}
