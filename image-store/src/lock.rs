// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Advisory per-file locks for writers.  The store itself does not
//! serialize writers; download workers take one of these to keep two
//! workers off the same file.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use fs4::FileExt;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;

/// An exclusive advisory lock on `<path>.lock`.  Released on drop.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: Utf8PathBuf,
}

fn open_lock_file(path: &Utf8Path) -> io::Result<(File, Utf8PathBuf)> {
    let lock_path = Utf8PathBuf::from(format!("{path}.lock"));
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)?;
    Ok((file, lock_path))
}

impl LockFile {
    /// Takes the lock guarding `path`, blocking until it is free.
    pub fn acquire(path: &Utf8Path) -> io::Result<LockFile> {
        let (file, lock_path) = open_lock_file(path)?;
        file.lock_exclusive()?;
        Ok(LockFile { file, path: lock_path })
    }

    /// Takes the lock guarding `path` if it is free; `None` when another
    /// holder has it.
    pub fn try_acquire(path: &Utf8Path) -> io::Result<Option<LockFile>> {
        let (file, lock_path) = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockFile { file, path: lock_path })),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
