// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The language family an [`Instance`] belongs to.
///
/// This is the coarsest fallback key the Specification Resolver matches a
/// profile on; every `(repo, version)` pair that isn't explicitly covered by
/// the profile table still resolves through its `language`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    Kotlin,
    C,
    Go,
}

impl Language {
    /// All known languages, for error messages that enumerate valid values.
    pub fn variants() -> &'static [Language] {
        &[
            Language::Python,
            Language::Java,
            Language::Kotlin,
            Language::C,
            Language::Go,
        ]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::C => "c",
            Language::Go => "go",
        };
        f.write_str(s)
    }
}

/// One (repo, commit, patch, expected-tests) evaluation task.
///
/// This is an immutable input record: the harness never mutates an
/// `Instance` after loading it from the dataset. `FAIL_TO_PASS` and
/// `PASS_TO_PASS` may be empty when the Test Collector has not yet
/// populated them (collect mode).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    /// Opaque unique identifier, e.g. `django__django-11133`.
    pub instance_id: String,

    /// Repository in `owner/name` form.
    pub repo: String,

    /// VCS revision the instance is evaluated against.
    pub base_commit: String,

    /// Unified diff text, applied from the repository root.
    pub patch: String,

    /// Unified diff that introduces or mutates tests, applied before
    /// `patch`. Empty when the instance carries no test changes.
    #[serde(default)]
    pub test_patch: String,

    /// Release tag of the target project, used to key environment
    /// recipes alongside `repo`.
    pub version: String,

    /// Language family, used as a fallback resolver key.
    pub language: Language,

    /// Commit hash used for environment setup, when it differs from
    /// `base_commit`.
    #[serde(default)]
    pub environment_setup_commit: Option<String>,

    /// Tests expected to transition from failing to passing once `patch`
    /// is applied.
    #[serde(default)]
    pub fail_to_pass: BTreeSet<String>,

    /// Tests expected to remain passing after `patch` is applied.
    #[serde(default)]
    pub pass_to_pass: BTreeSet<String>,
}

/// An `Instance` whose `FAIL_TO_PASS` and `PASS_TO_PASS` sets overlap.
///
/// The Resolver rejects instances in this state rather than guessing at
/// the intended semantics, per the harness's open question on this exact
/// ambiguity.
#[derive(Clone, Debug, thiserror::Error)]
#[error(
    "instance `{instance_id}` has {overlap_count} test(s) in both FAIL_TO_PASS and PASS_TO_PASS"
)]
pub struct OverlappingTestSetsError {
    pub instance_id: String,
    pub overlap_count: usize,
}

impl Instance {
    /// Validates the `FAIL_TO_PASS ∩ PASS_TO_PASS = ∅` invariant.
    ///
    /// The dataset format does not prevent a test from appearing in both
    /// sets; the harness never guesses which expectation should win, so
    /// this must be checked before the Instance is handed to the Resolver.
    pub fn validate(&self) -> Result<(), OverlappingTestSetsError> {
        let overlap_count = self.fail_to_pass.intersection(&self.pass_to_pass).count();
        if overlap_count > 0 {
            return Err(OverlappingTestSetsError {
                instance_id: self.instance_id.clone(),
                overlap_count,
            });
        }
        Ok(())
    }

    /// The patch content as it is written into the container: `test_patch`
    /// concatenated before `patch`, so that test files `patch` may touch
    /// exist before any test-selection runs.
    pub fn combined_patch(&self) -> String {
        let mut combined = String::with_capacity(self.test_patch.len() + self.patch.len() + 1);
        combined.push_str(&self.test_patch);
        if !self.test_patch.is_empty() && !self.test_patch.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&self.patch);
        combined
    }

    /// True if the Test Collector has not yet populated expected test sets.
    pub fn needs_collection(&self) -> bool {
        self.fail_to_pass.is_empty() && self.pass_to_pass.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(fail_to_pass: &[&str], pass_to_pass: &[&str]) -> Instance {
        Instance {
            instance_id: "pkg__pkg-1".to_string(),
            repo: "pkg/pkg".to_string(),
            base_commit: "abc123".to_string(),
            patch: "diff --git a/x b/x\n".to_string(),
            test_patch: String::new(),
            version: "1.0".to_string(),
            language: Language::Python,
            environment_setup_commit: None,
            fail_to_pass: fail_to_pass.iter().map(|s| s.to_string()).collect(),
            pass_to_pass: pass_to_pass.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn validate_rejects_overlapping_sets() {
        let i = instance(&["pkg.T::m1", "pkg.T::m2"], &["pkg.T::m2"]);
        let err = i.validate().unwrap_err();
        assert_eq!(err.overlap_count, 1);
    }

    #[test]
    fn validate_accepts_disjoint_sets() {
        let i = instance(&["pkg.T::m1"], &["pkg.T::m2"]);
        assert!(i.validate().is_ok());
    }

    #[test]
    fn combined_patch_puts_test_patch_first() {
        let mut i = instance(&[], &[]);
        i.test_patch = "diff --git a/test_x b/test_x\n".to_string();
        let combined = i.combined_patch();
        let test_idx = combined.find("test_x").unwrap();
        let patch_idx = combined.find("a/x b/x").unwrap();
        assert!(test_idx < patch_idx);
    }

    #[test]
    fn needs_collection_when_both_sets_empty() {
        assert!(instance(&[], &[]).needs_collection());
        assert!(!instance(&["t"], &[]).needs_collection());
    }
}
