// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Size and digest rules shared by the blocking and async file variants.
//! All the decisions live here; the variants contribute only I/O.

use crate::error::StoreError;
use std::io;

/// Buffer size for digest recomputation.
pub(crate) const HASH_BUF_SIZE: usize = 64 * 1024;

/// Admission check for an incremental append: the chunk must fit within the
/// declared total.  Nothing may be written when this fails.
pub(crate) fn admit_chunk(
    current_size: u64,
    total_size: u64,
    chunk_len: u64,
) -> Result<(), StoreError> {
    if current_size + chunk_len > total_size {
        return Err(StoreError::SizeMismatch);
    }
    Ok(())
}

/// After a scoped write leaves the file at `position`: the target length to
/// truncate to, if any.  Truncating at exactly the boundary is a no-op but
/// keeps the failure path deterministic when the writer overshot.
pub(crate) fn truncation_after_write(
    position: u64,
    total_size: u64,
) -> Option<u64> {
    (position >= total_size).then_some(total_size)
}

/// After truncation: writing past the declared total is a size mismatch.
pub(crate) fn overflow_after_write(
    position: u64,
    total_size: u64,
) -> Result<(), StoreError> {
    if position > total_size {
        return Err(StoreError::SizeMismatch);
    }
    Ok(())
}

/// Maps out-of-space write failures to the allocation error; everything
/// else passes through unchanged.
pub(crate) fn map_write_error(error: io::Error) -> StoreError {
    if error.raw_os_error() == Some(libc::ENOSPC) {
        StoreError::AllocationFail
    } else {
        StoreError::Io(error)
    }
}

/// Hex digests compare case-insensitively.
pub(crate) fn digest_matches(declared: &str, computed: &str) -> bool {
    declared.eq_ignore_ascii_case(computed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_admission_is_exact() {
        assert!(admit_chunk(0, 1024, 1024).is_ok());
        assert!(admit_chunk(960, 1024, 64).is_ok());
        assert!(matches!(
            admit_chunk(1024, 1024, 1),
            Err(StoreError::SizeMismatch)
        ));
        assert!(matches!(
            admit_chunk(1000, 1024, 64),
            Err(StoreError::SizeMismatch)
        ));
    }

    #[test]
    fn truncation_triggers_at_and_past_boundary() {
        assert_eq!(truncation_after_write(1023, 1024), None);
        assert_eq!(truncation_after_write(1024, 1024), Some(1024));
        assert_eq!(truncation_after_write(1025, 1024), Some(1024));
    }

    #[test]
    fn overflow_only_past_boundary() {
        assert!(overflow_after_write(1024, 1024).is_ok());
        assert!(matches!(
            overflow_after_write(1025, 1024),
            Err(StoreError::SizeMismatch)
        ));
    }

    #[test]
    fn enospc_becomes_allocation_fail() {
        let enospc = io::Error::from_raw_os_error(libc::ENOSPC);
        assert!(matches!(
            map_write_error(enospc),
            StoreError::AllocationFail
        ));
        let eio = io::Error::from_raw_os_error(libc::EIO);
        assert!(matches!(map_write_error(eio), StoreError::Io(_)));
    }

    #[test]
    fn digest_compare_ignores_case() {
        assert!(digest_matches("ABCDEF", "abcdef"));
        assert!(!digest_matches("abcdef", "abcdee"));
    }
}
