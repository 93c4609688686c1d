// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-disk name derivation for content-addressed files.

/// Shortest on-disk name, in hex characters of the SHA-256 digest.
pub const MIN_FILENAME_PREFIX_LEN: usize = 7;

/// Derives the on-disk filename for a file with digest `sha256`, given the
/// `(sha256, filename_on_disk)` pairs already tracked by the owning
/// inventory.
///
/// The name is normally the 7-character digest prefix.  If the inventory
/// already holds the exact digest, its existing name is reused (one blob,
/// one file).  If a different digest shares the prefix, the prefix is
/// widened just enough to be unambiguous, falling back to the full digest.
pub fn calculate_filename_on_disk<'a, I>(sha256: &str, existing: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let prefix_len = MIN_FILENAME_PREFIX_LEN.min(sha256.len());
    let prefix = &sha256[..prefix_len];

    let collisions: Vec<(&str, &str)> = existing
        .into_iter()
        .filter(|(other, _)| other.starts_with(prefix))
        .collect();
    if collisions.is_empty() {
        return prefix.to_string();
    }
    if let Some((_, name)) =
        collisions.iter().find(|(other, _)| *other == sha256)
    {
        return name.to_string();
    }
    for len in (prefix_len + 1)..=sha256.len() {
        let cut = &sha256[..len];
        if !collisions.iter().any(|(other, _)| other.starts_with(cut)) {
            return cut.to_string();
        }
    }
    sha256.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str =
        "aaaaaaa1111111111111111111111111111111111111111111111111111111aa";
    const SHA_B: &str =
        "aaaaaaa2222222222222222222222222222222222222222222222222222222bb";

    #[test]
    fn no_collision_gives_short_prefix() {
        assert_eq!(calculate_filename_on_disk(SHA_A, []), "aaaaaaa");
    }

    #[test]
    fn same_digest_reuses_existing_name() {
        let existing = [(SHA_A, "aaaaaaa1")];
        assert_eq!(
            calculate_filename_on_disk(SHA_A, existing),
            "aaaaaaa1"
        );
    }

    #[test]
    fn prefix_collision_widens_minimally() {
        let existing = [(SHA_B, "aaaaaaa")];
        assert_eq!(
            calculate_filename_on_disk(SHA_A, existing),
            "aaaaaaa1"
        );
    }

    #[test]
    fn deep_collision_falls_back_to_full_digest() {
        // Differs only in the final character.
        let near = format!("{}c", &SHA_A[..63]);
        let existing = [(near.as_str(), "deep")];
        assert_eq!(calculate_filename_on_disk(SHA_A, existing), SHA_A);
    }

    #[test]
    fn unrelated_digests_do_not_widen() {
        let existing = [(SHA_B, "aaaaaaa"), (SHA_A, "ignored")];
        let unrelated =
            "bbbbbbb333333333333333333333333333333333333333333333333333333333";
        assert_eq!(
            calculate_filename_on_disk(unrelated, existing),
            "bbbbbbb"
        );
    }
}
