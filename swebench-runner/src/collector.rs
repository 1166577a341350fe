// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Test Collector (SPEC_FULL.md §4.5): populates `FAIL_TO_PASS` /
//! `PASS_TO_PASS` for an instance that hasn't been labelled yet, by
//! running tests twice — once with only `test_patch` applied, once with
//! `test_patch` and `patch` both applied — and diffing the two observed
//! result sets.

use crate::engine::{ContainerEngine, ImageTag};
use crate::errors::InstanceError;
use crate::{record, runner};
use camino_tempfile::Utf8TempDir;
use std::collections::BTreeSet;
use std::sync::Arc;
use swebench_metadata::{Instance, ParsedResult, TestSpec, TestStatus};
use tracing::{instrument, warn};

/// The labels derived from one before/after collection pass, plus the
/// regression warning named in §4.5 step 3.
#[derive(Clone, Debug, Default)]
pub struct CollectedLabels {
    pub fail_to_pass: BTreeSet<String>,
    pub pass_to_pass: BTreeSet<String>,
    /// Tests that went `passed -> failed` between the two passes. Recorded
    /// as a warning; does not prevent output (§4.5 step 3).
    pub regressed: BTreeSet<String>,
}

/// Runs both collection passes for `instance` against the already-built
/// `instance_image`, returning the derived label sets.
///
/// `spec` is resolved the same way the Runner resolves any other
/// instance; its `fail_to_pass`/`pass_to_pass` fields are ignored here
/// since collection is what populates them.
#[instrument(skip(engine, instance), fields(instance_id = %instance.instance_id))]
pub async fn collect_labels(
    engine: &Arc<dyn ContainerEngine>,
    spec: &TestSpec,
    instance: &Instance,
    instance_image: &ImageTag,
) -> Result<CollectedLabels, InstanceError> {
    let before = run_pass(engine, spec, instance_image, &instance.test_patch).await?;
    let after = run_pass(engine, spec, instance_image, &instance.combined_patch()).await?;

    Ok(diff_passes(&before, &after))
}

/// One before/after pass: run the eval script with `patch_text` as the
/// entire patch, then parse whatever the eval script produced. Unlike the
/// Scheduler's main pipeline, a collection pass never grades — it only
/// needs the raw `{test_id -> status}` map, so a `ParseError` here simply
/// means "nothing observed this pass" rather than a fatal instance error.
async fn run_pass(
    engine: &Arc<dyn ContainerEngine>,
    spec: &TestSpec,
    instance_image: &ImageTag,
    patch_text: &str,
) -> Result<ParsedResult, InstanceError> {
    let outcome = runner::run(engine, spec, instance_image, patch_text).await?;
    if outcome.patch_rejected {
        return Err(crate::errors::PatchError { rejects: outcome.log }.into());
    }

    let tmp = Utf8TempDir::new().map_err(|e| {
        crate::errors::EngineError(format!("failed to create scratch dir for collection: {e}"))
    })?;
    let report_blobs = record::materialize_report(tmp.path(), outcome.report.as_deref())
        .map_err(|e| crate::errors::EngineError(e.to_string()))?;

    match crate::parsers::parse(spec, &outcome.log, &report_blobs) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!(error = %e, "collection pass observed no tests");
            Ok(ParsedResult::new())
        }
    }
}

/// Implements §4.5 step 3's set definitions directly:
/// `FAIL_TO_PASS = { t : before[t] in {failed,error,absent} and after[t] = passed }`,
/// `PASS_TO_PASS = { t : before[t] = passed and after[t] = passed }`,
/// regression = `{ t : before[t] = passed and after[t] != passed }`.
fn diff_passes(before: &ParsedResult, after: &ParsedResult) -> CollectedLabels {
    let mut labels = CollectedLabels::default();
    let all_ids: BTreeSet<&str> = before.test_ids().chain(after.test_ids()).collect();

    for id in all_ids {
        let before_status = before.status_of(id);
        let after_status = after.status_of(id);
        match (before_status, after_status) {
            (_, Some(TestStatus::Passed)) if !matches!(before_status, Some(TestStatus::Passed)) => {
                labels.fail_to_pass.insert(id.to_string());
            }
            (Some(TestStatus::Passed), Some(TestStatus::Passed)) => {
                labels.pass_to_pass.insert(id.to_string());
            }
            (Some(TestStatus::Passed), Some(_)) => {
                labels.regressed.insert(id.to_string());
            }
            _ => {}
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(entries: &[(&str, TestStatus)]) -> ParsedResult {
        let mut r = ParsedResult::new();
        for (id, status) in entries {
            r.record(id, *status);
        }
        r
    }

    #[test]
    fn newly_passing_test_becomes_fail_to_pass() {
        let before = result(&[("pkg.T::m1", TestStatus::Failed)]);
        let after = result(&[("pkg.T::m1", TestStatus::Passed)]);
        let labels = diff_passes(&before, &after);
        assert!(labels.fail_to_pass.contains("pkg::T::m1"));
        assert!(labels.pass_to_pass.is_empty());
    }

    #[test]
    fn absent_before_and_passing_after_becomes_fail_to_pass() {
        let before = result(&[]);
        let after = result(&[("pkg.T::m1", TestStatus::Passed)]);
        let labels = diff_passes(&before, &after);
        assert!(labels.fail_to_pass.contains("pkg::T::m1"));
    }

    #[test]
    fn stable_pass_becomes_pass_to_pass() {
        let before = result(&[("pkg.T::m2", TestStatus::Passed)]);
        let after = result(&[("pkg.T::m2", TestStatus::Passed)]);
        let labels = diff_passes(&before, &after);
        assert!(labels.pass_to_pass.contains("pkg::T::m2"));
    }

    #[test]
    fn passing_then_failing_is_a_regression_not_a_label() {
        let before = result(&[("pkg.T::m3", TestStatus::Passed)]);
        let after = result(&[("pkg.T::m3", TestStatus::Failed)]);
        let labels = diff_passes(&before, &after);
        assert!(labels.regressed.contains("pkg::T::m3"));
        assert!(labels.fail_to_pass.is_empty());
        assert!(labels.pass_to_pass.is_empty());
    }

    #[test]
    fn fail_to_pass_and_pass_to_pass_are_always_disjoint() {
        let before = result(&[("a", TestStatus::Failed), ("b", TestStatus::Passed)]);
        let after = result(&[("a", TestStatus::Passed), ("b", TestStatus::Passed)]);
        let labels = diff_passes(&before, &after);
        assert!(labels.fail_to_pass.is_disjoint(&labels.pass_to_pass));
    }
}
