// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for a harness invocation.
///
/// The harness itself only ever returns one of the three codes named in the
/// external interface contract; the rest of this enum is reserved for
/// forward-compatible, more granular failure reporting without breaking the
/// coarse 0/1/2 contract callers rely on today.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum HarnessExitCode {}

impl HarnessExitCode {
    /// Every instance reached a terminal verdict (including `unresolved`).
    pub const OK: i32 = 0;

    /// An internal error (engine unavailable, disk exhaustion, panic)
    /// prevented the run from completing.
    pub const INTERNAL_ERROR: i32 = 1;

    /// The dataset, predictions file, or CLI arguments were invalid.
    pub const INVALID_INPUT: i32 = 2;
}
