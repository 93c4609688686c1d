// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Filesystem free-space probe, via `statvfs(3)`.

use camino::Utf8Path;
use std::ffi::CString;
use std::io;

/// Free space information for the filesystem containing a path.
#[derive(Debug, Clone, Copy)]
pub struct DiskSpace {
    /// Total size of the filesystem in bytes.
    pub total_bytes: u64,
    /// Bytes available to unprivileged writers.
    pub available_bytes: u64,
}

/// Queries the filesystem containing `path`.
pub fn disk_space(path: &Utf8Path) -> io::Result<DiskSpace> {
    let path_cstr = CString::new(path.as_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs is a plain C struct of integers with no invariants,
    // so zero-initialization is valid.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `path_cstr` is a valid NUL-terminated string and `stat` is a
    // valid statvfs out-pointer for the duration of the call.
    let rc = unsafe { libc::statvfs(path_cstr.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let frsize = stat.f_frsize as u64;
    Ok(DiskSpace {
        total_bytes: (stat.f_blocks as u64).saturating_mul(frsize),
        available_bytes: (stat.f_bavail as u64).saturating_mul(frsize),
    })
}

/// Bytes available for new writes on the filesystem containing `path`.
pub fn free_space(path: &Utf8Path) -> io::Result<u64> {
    Ok(disk_space(path)?.available_bytes)
}
