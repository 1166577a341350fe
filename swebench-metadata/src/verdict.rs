// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ids::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The grader's classification for one instance in one run (§3, §4.6).
///
/// Variant order matters: it is the precedence order the Grader applies
/// when more than one condition could apply (§4.6, §7) — an undefined
/// judgement (`BuildError` through `ParseError`) always wins over a
/// defined one (`Resolved` through `Unresolved`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Every `FAIL_TO_PASS` test passed and no `PASS_TO_PASS` test
    /// regressed.
    Resolved,
    /// At least one `FAIL_TO_PASS` test passed, no `PASS_TO_PASS`
    /// regression, but not all `FAIL_TO_PASS` tests passed.
    PartiallyResolved,
    /// The run completed and parsed cleanly, but neither of the above
    /// held.
    Unresolved,
    /// The instance image could not be resolved or built, or the patch
    /// did not apply.
    BuildError,
    /// The eval script exited nonzero and no tests were observed.
    RunError,
    /// The eval script exceeded its wall-clock timeout.
    Timeout,
    /// The captured logs could not be parsed, or no tests were observed
    /// at all despite a clean exit.
    ParseError,
}

impl Resolution {
    /// True for `build_error`, `run_error`, `timeout`, and `parse_error`
    /// — the "judgement is undefined, for this reason" family (§4.6, §7).
    pub fn is_undefined(self) -> bool {
        matches!(
            self,
            Resolution::BuildError
                | Resolution::RunError
                | Resolution::Timeout
                | Resolution::ParseError
        )
    }
}

/// A stable, machine-readable tag explaining why a [`Resolution`] was
/// reached, carried on every `Verdict` per §7.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// A graded verdict: nothing went wrong before grading.
    None,
    /// No repository/version/language profile matched the instance.
    UnknownProfile,
    /// A base, env, or instance image build failed.
    ImageBuildFailed,
    /// The patch (or test_patch) did not apply.
    PatchFailed,
    /// The eval script exited nonzero and parsers found no tests.
    RunFailed,
    /// The wall-clock timeout elapsed.
    TimedOut,
    /// Logs were unparseable or empty after a successful run.
    Unparseable,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Reason::None => "none",
            Reason::UnknownProfile => "unknown_profile",
            Reason::ImageBuildFailed => "image_build_failed",
            Reason::PatchFailed => "patch_failed",
            Reason::RunFailed => "run_failed",
            Reason::TimedOut => "timed_out",
            Reason::Unparseable => "unparseable",
        };
        f.write_str(s)
    }
}

/// Timing information carried on a `Verdict` for observability.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Timings {
    pub build_duration: Option<Duration>,
    pub run_duration: Option<Duration>,
}

/// The persisted commit marker for one instance in one run (§6): its
/// presence under `results/<run_id>/<instance_id>/verdict.json` means the
/// instance is complete.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verdict {
    pub schema_version: SchemaVersion,
    pub instance_id: String,
    pub resolved: Resolution,
    pub reason: Reason,
    /// Human-readable elaboration of `reason`, e.g. reject-hunk text for
    /// `patch_failed`.
    pub message: Option<String>,
    pub timings: Timings,
}

impl Verdict {
    pub fn graded(instance_id: impl Into<String>, resolved: Resolution, timings: Timings) -> Self {
        debug_assert!(!resolved.is_undefined());
        Self {
            schema_version: SchemaVersion::CURRENT,
            instance_id: instance_id.into(),
            resolved,
            reason: Reason::None,
            message: None,
            timings,
        }
    }

    pub fn errored(
        instance_id: impl Into<String>,
        resolved: Resolution,
        reason: Reason,
        message: impl Into<String>,
    ) -> Self {
        debug_assert!(resolved.is_undefined());
        Self {
            schema_version: SchemaVersion::CURRENT,
            instance_id: instance_id.into(),
            resolved,
            reason,
            message: Some(message.into()),
            timings: Timings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_undefined_matches_the_four_error_resolutions() {
        assert!(Resolution::BuildError.is_undefined());
        assert!(Resolution::RunError.is_undefined());
        assert!(Resolution::Timeout.is_undefined());
        assert!(Resolution::ParseError.is_undefined());
        assert!(!Resolution::Resolved.is_undefined());
        assert!(!Resolution::PartiallyResolved.is_undefined());
        assert!(!Resolution::Unresolved.is_undefined());
    }

    #[test]
    fn verdict_json_round_trips() {
        let v = Verdict::graded("pkg__pkg-1", Resolution::Resolved, Timings::default());
        let json = serde_json::to_string(&v).unwrap();
        let back: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(back.instance_id, "pkg__pkg-1");
        assert_eq!(back.resolved, Resolution::Resolved);
    }
}
