// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Grader (SPEC_FULL.md §4.6): a pure function from a [`ParsedResult`]
//! and the expected test sets to a [`Resolution`]. The five undefined
//! resolutions (build/run/timeout/parse error) are produced by the
//! Scheduler directly from an [`crate::errors::InstanceError`] and never
//! reach this function; `grade` only ever returns the three defined
//! outcomes.

use swebench_metadata::{ParsedResult, Resolution, TestSpec};

/// Grades a clean run: `spec.fail_to_pass`/`pass_to_pass` against what
/// `parsed` actually observed.
///
/// Precedence, per §4.6: `resolved` requires every `FAIL_TO_PASS` test to
/// have passed and no `PASS_TO_PASS` test to have regressed.
/// `partially_resolved` requires at least one `FAIL_TO_PASS` pass with no
/// `PASS_TO_PASS` regression. Anything else is `unresolved`.
pub fn grade(parsed: &ParsedResult, spec: &TestSpec) -> Resolution {
    let pass_to_pass_regressed = spec
        .pass_to_pass
        .iter()
        .any(|t| !matches!(parsed.status_of(t), Some(status) if status.is_passed()));

    let fail_to_pass_passed = spec
        .fail_to_pass
        .iter()
        .filter(|t| matches!(parsed.status_of(t), Some(status) if status.is_passed()))
        .count();

    if !pass_to_pass_regressed && fail_to_pass_passed == spec.fail_to_pass.len() {
        return Resolution::Resolved;
    }
    if !pass_to_pass_regressed && fail_to_pass_passed > 0 {
        return Resolution::PartiallyResolved;
    }
    Resolution::Unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;
    use swebench_metadata::{ImageKey, ParserId, SchemaVersion, TestStatus};

    fn spec(fail_to_pass: &[&str], pass_to_pass: &[&str]) -> TestSpec {
        TestSpec {
            schema_version: SchemaVersion::CURRENT,
            instance_id: "pkg__pkg-1".to_string(),
            base_image: "python:3.11-slim".to_string(),
            base_key: ImageKey("base".to_string()),
            env_key: ImageKey("env".to_string()),
            instance_key: ImageKey("instance".to_string()),
            setup_script: String::new(),
            install_script: String::new(),
            eval_script_template: String::new(),
            test_command: String::new(),
            timeout: Duration::from_secs(1800),
            log_parser_id: ParserId("pytest".to_string()),
            fail_to_pass: fail_to_pass.iter().map(|s| s.to_string()).collect(),
            pass_to_pass: pass_to_pass.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn result(entries: &[(&str, TestStatus)]) -> ParsedResult {
        let mut r = ParsedResult::new();
        for (id, status) in entries {
            r.record(id, *status);
        }
        r
    }

    // S1
    #[test]
    fn s1_all_expected_pass_is_resolved() {
        let spec = spec(&["pkg.T::m1"], &["pkg.T::m2"]);
        let parsed = result(&[("pkg.T::m1", TestStatus::Passed), ("pkg.T::m2", TestStatus::Passed)]);
        assert_eq!(grade(&parsed, &spec), Resolution::Resolved);
    }

    // S2
    #[test]
    fn s2_fail_to_pass_still_failing_is_unresolved() {
        let spec = spec(&["pkg.T::m1"], &["pkg.T::m2"]);
        let parsed = result(&[("pkg.T::m1", TestStatus::Failed), ("pkg.T::m2", TestStatus::Passed)]);
        assert_eq!(grade(&parsed, &spec), Resolution::Unresolved);
    }

    // S3
    #[test]
    fn s3_pass_to_pass_regression_is_unresolved() {
        let spec = spec(&["pkg.T::m1"], &["pkg.T::m2"]);
        let parsed = result(&[("pkg.T::m1", TestStatus::Passed), ("pkg.T::m2", TestStatus::Failed)]);
        assert_eq!(grade(&parsed, &spec), Resolution::Unresolved);
    }

    #[test]
    fn partial_credit_when_some_fail_to_pass_pass_and_no_regression() {
        let spec = spec(&["pkg.T::m1", "pkg.T::m3"], &["pkg.T::m2"]);
        let parsed = result(&[
            ("pkg.T::m1", TestStatus::Passed),
            ("pkg.T::m2", TestStatus::Passed),
            ("pkg.T::m3", TestStatus::Failed),
        ]);
        assert_eq!(grade(&parsed, &spec), Resolution::PartiallyResolved);
    }

    #[test]
    fn zero_length_fail_to_pass_resolves_on_no_regression() {
        let spec = spec(&[], &["pkg.T::m2"]);
        let parsed = result(&[("pkg.T::m2", TestStatus::Passed)]);
        assert_eq!(grade(&parsed, &spec), Resolution::Resolved);
    }

    #[test]
    fn missing_test_in_parsed_result_counts_as_not_passed() {
        let spec = spec(&["pkg.T::m1"], &[]);
        let parsed = result(&[]);
        assert_eq!(grade(&parsed, &spec), Resolution::Unresolved);
    }

    #[test]
    fn error_status_on_pass_to_pass_counts_as_regression() {
        let spec = spec(&["pkg.T::m1"], &["pkg.T::m2"]);
        let parsed = result(&[("pkg.T::m1", TestStatus::Passed), ("pkg.T::m2", TestStatus::Error)]);
        assert_eq!(grade(&parsed, &spec), Resolution::Unresolved);
    }
}
