// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Evaluation Runner (SPEC_FULL.md §4.3): `run(spec, patch) ->
//! RunRecord`. Every step is bounded and has a defined failure; the
//! container is removed on every exit path, including error paths, so
//! that "no container survives its RunRecord" (§3) holds even when the
//! patch does not apply or the eval script times out.

use crate::engine::{ContainerEngine, ContainerId, ImageTag, RunSpec, WaitOutcome};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use swebench_metadata::{RunRecord, TestSpec};
use tracing::{debug, instrument, warn};

/// Where the combined patch is written inside the container (§4.3 step 2).
pub const PATCH_PATH: &str = "/swebench/patch.diff";

/// Best-effort conventional path a structured report is written to. Eval
/// scripts for report-producing frameworks (JUnit-style) write here; the
/// Runner always attempts to copy it out after the eval script exits,
/// ignoring a miss for profiles that never produce one.
pub const REPORT_PATH: &str = "/swebench/report.xml";

/// The sentinel exit code the default profile templates use to signal
/// that `git apply` rejected the patch, as distinct from the test command
/// itself exiting nonzero (tests failing is a normal, gradeable outcome).
const PATCH_REJECTED_EXIT_CODE: i32 = 97;

/// The grace period between a graceful stop and a forceful container
/// removal (§4.3 step 5).
const DEFAULT_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

/// The classified outcome of one [`run`] invocation, before grading.
///
/// `record` is always populated once a container was successfully
/// created; the three boolean-ish classifications let the caller (the
/// Scheduler) decide which error kind from [`crate::errors`] applies
/// without the Runner itself depending on the Grader or Parsers.
#[derive(Debug)]
pub struct RunOutcome {
    pub record: RunRecord,
    /// Combined stdout+stderr captured from the eval script exec.
    pub log: String,
    /// The structured report at [`REPORT_PATH`], if the eval script
    /// produced one. The Record writer (§6) is responsible for persisting
    /// this to `report.xml` under the instance's result directory; the
    /// Runner only knows the in-container convention, not the host layout.
    pub report: Option<Vec<u8>>,
    /// `git apply` (or the profile's equivalent) rejected the patch.
    pub patch_rejected: bool,
    /// The eval script exceeded `spec.timeout`.
    pub timed_out: bool,
}

/// Runs `spec`'s eval script against a container created from
/// `instance_image`, applying `combined_patch` first.
///
/// Mirrors SPEC_FULL.md §4.3 steps 2-5: the Builder (§4.2) is responsible
/// for step 1 producing `instance_image`; this function owns writing the
/// patch, executing the rendered eval script under `spec.timeout`, and
/// tearing the container down on every exit path.
#[instrument(skip(engine, combined_patch), fields(instance_id = %spec.instance_id))]
pub async fn run(
    engine: &Arc<dyn ContainerEngine>,
    spec: &TestSpec,
    instance_image: &ImageTag,
    combined_patch: &str,
) -> Result<RunOutcome, crate::errors::EngineError> {
    let started_at = Utc::now();
    let env = BTreeMap::new();
    let container_id = engine
        .create_and_start(RunSpec {
            image: instance_image,
            env: &env,
            workdir: Utf8Path::new("/testbed"),
            network_enabled: false,
        })
        .await
        .map_err(crate::errors::EngineError::from)?;

    let outcome = drive(engine, spec, &container_id, combined_patch, started_at).await;

    if let Err(e) = engine.stop_and_remove(&container_id, DEFAULT_GRACE).await {
        warn!(container = %container_id.0, error = %e, "failed to tear down container");
    }

    outcome
}

/// The body of [`run`] once a container exists, split out so `run` can
/// guarantee teardown runs regardless of how this returns.
async fn drive(
    engine: &Arc<dyn ContainerEngine>,
    spec: &TestSpec,
    container_id: &ContainerId,
    combined_patch: &str,
    started_at: chrono::DateTime<Utc>,
) -> Result<RunOutcome, crate::errors::EngineError> {
    engine
        .copy_in(container_id, Utf8Path::new(PATCH_PATH), combined_patch.as_bytes())
        .await
        .map_err(crate::errors::EngineError::from)?;

    let rendered = spec.eval_script_template.replace("{patch_path}", PATCH_PATH);
    debug!(timeout = ?spec.timeout, "executing eval script");
    let (wait_outcome, log_bytes) = engine
        .exec(container_id, &rendered, spec.timeout)
        .await
        .map_err(crate::errors::EngineError::from)?;
    let log = String::from_utf8_lossy(&log_bytes).into_owned();

    let report = match engine.copy_out(container_id, Utf8Path::new(REPORT_PATH)).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "no structured report produced");
            None
        }
    };

    let (exit_code, timed_out) = match wait_outcome {
        WaitOutcome::Exited(code) => (Some(code), false),
        WaitOutcome::TimedOut => (None, true),
    };
    let patch_rejected = exit_code == Some(PATCH_REJECTED_EXIT_CODE)
        || log.contains("SWEBENCH_PATCH_REJECTED");

    let record = RunRecord {
        instance_id: spec.instance_id.clone(),
        image_key: spec.instance_key.clone(),
        container_id: container_id.0.clone(),
        started_at,
        finished_at: Some(Utc::now()),
        exit_code,
        timed_out,
        log_blob: Utf8PathBuf::from("run.log"),
        report_blobs: if report.is_some() { vec![Utf8PathBuf::from("report.xml")] } else { Vec::new() },
    };

    Ok(RunOutcome { record, log, report, patch_rejected, timed_out })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBehavior, FakeEngine};

    fn spec() -> TestSpec {
        use std::collections::BTreeSet;
        use std::time::Duration;
        use swebench_metadata::{ImageKey, ParserId, SchemaVersion};
        TestSpec {
            schema_version: SchemaVersion::CURRENT,
            instance_id: "pkg__pkg-1".to_string(),
            base_image: "python:3.11-slim".to_string(),
            base_key: ImageKey("base".to_string()),
            env_key: ImageKey("env".to_string()),
            instance_key: ImageKey("instance".to_string()),
            setup_script: String::new(),
            install_script: String::new(),
            eval_script_template: "git apply {patch_path}\npytest -rA\n".to_string(),
            test_command: "pytest -rA".to_string(),
            timeout: Duration::from_secs(5),
            log_parser_id: ParserId("pytest".to_string()),
            fail_to_pass: BTreeSet::new(),
            pass_to_pass: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn successful_run_produces_a_terminal_record() {
        let engine: Arc<dyn ContainerEngine> =
            Arc::new(FakeEngine::new(FakeBehavior::Succeed { log: "pkg.T::m1 PASSED\n".to_string() }));
        let outcome = run(&engine, &spec(), &ImageTag("img".to_string()), "diff").await.unwrap();
        assert!(outcome.record.is_terminal());
        assert!(!outcome.timed_out);
        assert!(!outcome.patch_rejected);
        assert_eq!(outcome.log, "pkg.T::m1 PASSED\n");
    }

    #[tokio::test]
    async fn patch_rejection_is_classified_distinctly_from_test_failure() {
        let engine: Arc<dyn ContainerEngine> = Arc::new(FakeEngine::new(FakeBehavior::PatchRejected));
        let outcome = run(&engine, &spec(), &ImageTag("img".to_string()), "diff").await.unwrap();
        assert!(outcome.patch_rejected);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn timeout_is_classified_and_container_still_torn_down() {
        let engine = Arc::new(FakeEngine::new(FakeBehavior::TimedOut));
        let outcome =
            run(&(engine.clone() as Arc<dyn ContainerEngine>), &spec(), &ImageTag("img".to_string()), "diff")
                .await
                .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(engine.live_container_count(), 0);
    }

    #[tokio::test]
    async fn container_is_removed_even_when_copy_in_fails() {
        let engine = Arc::new(FakeEngine::new(FakeBehavior::FailCopyIn));
        let result =
            run(&(engine.clone() as Arc<dyn ContainerEngine>), &spec(), &ImageTag("img".to_string()), "diff")
                .await;
        assert!(result.is_err());
        assert_eq!(engine.live_container_count(), 0);
    }
}
