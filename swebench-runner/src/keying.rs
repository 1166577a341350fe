// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed key fingerprinting shared by the Resolver (which
//! derives the three keys a [`TestSpec`](swebench_metadata::TestSpec)
//! carries) and the Image Builder (which uses those keys as its build
//! graph's node identity).
//!
//! Per SPEC_FULL.md §4.2: a fingerprint is a hash of the parent key, the
//! dockerfile-equivalent script body, and any other build-affecting input
//! (build args, file contents), rendered as a lowercase hex string.

use swebench_metadata::ImageKey;
use xxhash_rust::xxh3::Xxh3;

/// Hashes `parts` in order into a single [`ImageKey`].
///
/// Each part is length-prefixed before hashing so that `["ab", "c"]` and
/// `["a", "bc"]` never collide.
pub fn fingerprint(parts: &[&str]) -> ImageKey {
    let mut hasher = Xxh3::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    ImageKey(format!("{:016x}", hasher.digest()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(
            fingerprint(&["a", "b", "c"]),
            fingerprint(&["a", "b", "c"])
        );
    }

    #[test]
    fn fingerprint_distinguishes_part_boundaries() {
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }

    #[test]
    fn fingerprint_is_sensitive_to_content() {
        assert_ne!(fingerprint(&["a"]), fingerprint(&["b"]));
    }
}
