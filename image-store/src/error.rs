// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use thiserror::Error;

/// Errors surfaced by the local file store.  The display strings for the
/// first three variants are the reasons shown verbatim at the upload/download
/// API boundary and must not drift.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The filesystem backing the store cannot hold the bytes about to be
    /// written.  The partial file is left on disk; a resumed transfer may
    /// succeed once space is freed.
    #[error("No space left on device")]
    AllocationFail,

    /// Bytes written disagree with the declared total size.
    #[error("Content-Length doesn't equal size of received data")]
    SizeMismatch,

    /// The on-disk content does not hash to the declared digest.
    #[error("Saved content does not match given SHA256 value")]
    InvalidHash,

    #[error("I/O error")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// True for the integrity failures that leave no artifact behind.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, StoreError::SizeMismatch | StoreError::InvalidHash)
    }
}
