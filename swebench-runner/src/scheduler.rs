// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Work Scheduler (SPEC_FULL.md §4.7): a bounded worker pool over
//! instances with cancellation, progress reporting, and Resume. Bounded
//! concurrency is expressed via `future_queue`'s buffered stream
//! combinator over an iterator of instances — the same crate
//! `nextest-runner` uses for its own bounded test execution — rather
//! than a hand-rolled semaphore loop (§9 "promises over
//! threads-with-locks", generalised to the worker pool itself).

use crate::build::BuildGraph;
use crate::engine::ContainerEngine;
use crate::errors::{InstanceError, PatchError, ParseError as RunnerParseError, RunError, TimeoutError};
use crate::record::{self, RunRoot, Summary};
use crate::{grader, parsers, resolver, runner};
use camino::Utf8PathBuf;
use future_queue::StreamExt as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use swebench_metadata::{CacheLevel, Instance, Reason, Resolution, Timings, Verdict};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{instrument, warn};

/// Knobs named in the external interface (§6) and the concurrency model
/// (§5): worker bound, optional separate build concurrency bound,
/// Resume/force-rebuild, cache eviction policy, and the output namespace.
#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    pub max_workers: usize,
    pub run_id: String,
    pub results_root: Utf8PathBuf,
    pub force_rebuild: bool,
    pub cache_level: CacheLevel,
    /// Image-registry prefix applied to every env/instance tag this run
    /// builds; empty means no prefix (§6 "namespace ... may be empty").
    pub namespace: String,
    /// Overrides every resolved `TestSpec.timeout` when set (§6 "timeout").
    /// Profiles still govern the default; this only applies when the
    /// caller explicitly asked for a different budget.
    pub timeout_override: Option<std::time::Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_workers: 8,
            run_id: "run".to_string(),
            results_root: Utf8PathBuf::from("results"),
            force_rebuild: false,
            cache_level: CacheLevel::default(),
            namespace: String::new(),
            timeout_override: None,
        }
    }
}

/// Structured progress events (§4.7), pushed onto an unbounded channel so
/// emission never blocks a worker — mirroring `ReporterEvent`/`TestEvent`
/// in the teacher's own `reporter/events.rs`.
#[derive(Clone, Debug)]
pub enum SchedulerEvent {
    InstanceStarted { instance_id: String },
    ImageReady { instance_id: String },
    RunFinished { instance_id: String },
    VerdictReady { instance_id: String, resolved: Resolution },
    InstanceSkipped { instance_id: String },
}

/// A cooperative cancel signal (§5 "Cancellation"): queued work stops
/// being dequeued, in-flight work is allowed to finish naturally (builds)
/// or is asked to terminate (the Runner honours its own timeout
/// regardless, so cancellation here only gates *new* dequeues).
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Scheduler {
    engine: Arc<dyn ContainerEngine>,
    builder: Arc<BuildGraph>,
    profiles: Arc<crate::profile::ProfileTable>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        profiles: Arc<crate::profile::ProfileTable>,
        options: SchedulerOptions,
    ) -> Self {
        let builder = BuildGraph::new(Arc::clone(&engine)).with_namespace(options.namespace.clone());
        Self { builder: Arc::new(builder), engine, profiles, options }
    }

    /// Runs `instances` to completion (or until cancelled), returning the
    /// aggregate [`Summary`] and a progress-event receiver. Completed
    /// instances (a `verdict.json` already on disk for `run_id`) are
    /// skipped unless `force_rebuild` is set (§4.7 "Resume").
    pub fn run(
        &self,
        instances: Vec<Instance>,
    ) -> (impl std::future::Future<Output = Summary> + '_, UnboundedReceiver<SchedulerEvent>, CancelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelHandle::default();
        let fut = self.drain(instances, tx, cancel.clone());
        (fut, rx, cancel)
    }

    async fn drain(
        &self,
        instances: Vec<Instance>,
        events: UnboundedSender<SchedulerEvent>,
        cancel: CancelHandle,
    ) -> Summary {
        let root = RunRoot::new(self.options.results_root.clone(), &self.options.run_id);
        let max_workers = self.options.max_workers.max(1);

        let mut resumed = Vec::new();
        let pending: Vec<_> = instances
            .into_iter()
            .filter_map(|instance| {
                if cancel.is_cancelled() {
                    return None;
                }
                let dir = root.instance_dir(&instance.instance_id);
                if !self.options.force_rebuild && dir.is_complete() {
                    let _ = events.send(SchedulerEvent::InstanceSkipped {
                        instance_id: instance.instance_id.clone(),
                    });
                    if let Ok(v) = dir.read_verdict() {
                        resumed.push(v);
                    }
                    return None;
                }
                // Each instance is weighted 1: `future_queue` admits the
                // next entry once total in-flight weight drops below
                // `max_workers`, the same queue discipline the teacher
                // uses per-test with per-test thread weights.
                Some((1usize, self.evaluate(instance, &root, &events)))
            })
            .collect();

        let mut verdicts: Vec<Verdict> =
            futures::stream::iter(pending).future_queue(max_workers).collect().await;
        verdicts.extend(resumed);

        let summary = Summary::from_verdicts(self.options.run_id.clone(), verdicts);
        if let Err(e) = summary.write(&root) {
            warn!(error = %e, "failed to write summary.json");
        }
        summary
    }

    /// Resolve → Build → Run → Parse → Grade for one instance, persisting
    /// every artifact as it becomes available and `verdict.json` last
    /// (§6, the commit marker).
    #[instrument(skip(self, events), fields(instance_id = %instance.instance_id))]
    async fn evaluate(
        &self,
        instance: Instance,
        root: &RunRoot,
        events: &UnboundedSender<SchedulerEvent>,
    ) -> Verdict {
        let _ = events.send(SchedulerEvent::InstanceStarted { instance_id: instance.instance_id.clone() });
        let dir = root.instance_dir(&instance.instance_id);
        let instance_id = instance.instance_id.clone();

        let (verdict, spec) = self.evaluate_inner(&instance, &dir, events).await;
        if let Err(e) = dir.write_verdict(&verdict) {
            warn!(error = %e, "failed to persist verdict.json");
        }
        if let Some(spec) = spec {
            self.builder.evict(&spec, self.options.cache_level).await;
        }
        let _ = events.send(SchedulerEvent::VerdictReady {
            instance_id,
            resolved: verdict.resolved,
        });
        verdict
    }

    /// Returns the verdict plus the resolved `TestSpec`, when resolution
    /// got far enough to produce one, so the caller can evict its build
    /// graph entries regardless of where the pipeline stopped.
    async fn evaluate_inner(
        &self,
        instance: &Instance,
        dir: &record::InstanceDir,
        events: &UnboundedSender<SchedulerEvent>,
    ) -> (Verdict, Option<swebench_metadata::TestSpec>) {
        let spec = match resolver::resolve(instance, &self.profiles) {
            Ok(mut spec) => {
                if let Some(timeout) = self.options.timeout_override {
                    spec.timeout = timeout;
                }
                spec
            }
            Err(e) => {
                return (
                    Verdict::errored(
                        instance.instance_id.clone(),
                        Resolution::BuildError,
                        Reason::UnknownProfile,
                        e.to_string(),
                    ),
                    None,
                );
            }
        };
        if let Err(e) = dir.write_spec(&spec) {
            warn!(error = %e, "failed to persist spec.json");
        }

        let build_start = Instant::now();
        let instance_image = match self.builder.build_for_spec(&spec).await {
            Ok(tag) => tag,
            Err(e) => {
                return (
                    Verdict::errored(
                        instance.instance_id.clone(),
                        Resolution::BuildError,
                        Reason::ImageBuildFailed,
                        e.to_string(),
                    ),
                    Some(spec),
                );
            }
        };
        let _ = events.send(SchedulerEvent::ImageReady { instance_id: instance.instance_id.clone() });
        let build_duration = build_start.elapsed();

        let run_start = Instant::now();
        let outcome = match runner::run(&self.engine, &spec, &instance_image, &instance.combined_patch()).await {
            Ok(o) => o,
            Err(e) => {
                let err = InstanceError::from(e);
                return (
                    Verdict::errored(instance.instance_id.clone(), err.resolution(), err.reason(), err.to_string()),
                    Some(spec),
                );
            }
        };
        let _ = events.send(SchedulerEvent::RunFinished { instance_id: instance.instance_id.clone() });
        let run_duration = run_start.elapsed();
        let timings = Timings { build_duration: Some(build_duration), run_duration: Some(run_duration) };

        if let Err(e) = dir.write_log(&outcome.log) {
            warn!(error = %e, "failed to persist run.log");
        }
        if let Some(report) = &outcome.report {
            if let Err(e) = dir.write_report(report) {
                warn!(error = %e, "failed to persist report.xml");
            }
        }

        if outcome.patch_rejected {
            let err = InstanceError::from(PatchError { rejects: outcome.log.clone() });
            return (
                Verdict::errored(instance.instance_id.clone(), err.resolution(), err.reason(), outcome.log),
                Some(spec),
            );
        }
        if outcome.timed_out {
            let err = InstanceError::from(TimeoutError { budget: spec.timeout });
            return (
                Verdict::errored(
                    instance.instance_id.clone(),
                    err.resolution(),
                    err.reason(),
                    format!("exceeded {:?}", spec.timeout),
                ),
                Some(spec),
            );
        }

        let report_blobs: Vec<Utf8PathBuf> =
            outcome.record.report_blobs.iter().map(|p| dir.path().join(p)).collect();
        let verdict = match parsers::parse(&spec, &outcome.log, &report_blobs) {
            Ok(parsed) => {
                if let Err(e) = dir.write_parsed(&parsed) {
                    warn!(error = %e, "failed to persist parsed.json");
                }
                let resolution = grader::grade(&parsed, &spec);
                Verdict::graded(instance.instance_id.clone(), resolution, timings)
            }
            Err(RunnerParseError::NoTestsObserved) if outcome.record.exit_code.is_some_and(|c| c != 0) => {
                let exit_code = outcome.record.exit_code.unwrap();
                let err = InstanceError::from(RunError { exit_code });
                Verdict::errored(instance.instance_id.clone(), err.resolution(), err.reason(), err.to_string())
            }
            Err(e) => {
                let err = InstanceError::from(e);
                Verdict::errored(instance.instance_id.clone(), err.resolution(), err.reason(), err.to_string())
            }
        };
        (verdict, Some(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileTable;
    use crate::testing::{FakeBehavior, FakeEngine};
    use std::collections::BTreeSet;
    use swebench_metadata::Language;

    fn instance(id: &str, fail_to_pass: &[&str], pass_to_pass: &[&str]) -> Instance {
        Instance {
            instance_id: id.to_string(),
            repo: "some/repo".to_string(),
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

    async fn run_one(behavior: FakeBehavior, tmp: &camino_tempfile::Utf8TempDir) -> Verdict {
        let engine: Arc<dyn ContainerEngine> = Arc::new(FakeEngine::new(behavior));
        let profiles = Arc::new(ProfileTable::load(None).unwrap());
        let options = SchedulerOptions {
            max_workers: 2,
            run_id: "run-1".to_string(),
            results_root: tmp.path().to_owned(),
            force_rebuild: false,
            cache_level: CacheLevel::All,
            namespace: String::new(),
            timeout_override: None,
        };
        let scheduler = Scheduler::new(engine, profiles, options);
        let instances = vec![instance("pkg__pkg-1", &["pkg.T::m1"], &["pkg.T::m2"])];
        let (fut, _rx, _cancel) = scheduler.run(instances);
        let summary = fut.await;
        summary.verdicts.into_iter().next().unwrap()
    }

    // S1
    #[tokio::test]
    async fn s1_all_expected_pass_is_resolved() {
        let tmp = camino_tempfile::Utf8TempDir::new().unwrap();
        let verdict = run_one(
            FakeBehavior::Succeed { log: "pkg.T::m1 PASSED\npkg.T::m2 PASSED\n".to_string() },
            &tmp,
        )
        .await;
        assert_eq!(verdict.resolved, Resolution::Resolved);
    }

    // S4
    #[tokio::test]
    async fn s4_patch_rejection_short_circuits_before_parsing() {
        let tmp = camino_tempfile::Utf8TempDir::new().unwrap();
        let verdict = run_one(FakeBehavior::PatchRejected, &tmp).await;
        assert_eq!(verdict.resolved, Resolution::BuildError);
        assert_eq!(verdict.reason, Reason::PatchFailed);
        let dir = RunRoot::new(tmp.path().to_owned(), "run-1").instance_dir("pkg__pkg-1");
        assert!(!dir.path().join("parsed.json").is_file());
    }

    // S5
    #[tokio::test]
    async fn s5_timeout_is_classified_distinctly() {
        let tmp = camino_tempfile::Utf8TempDir::new().unwrap();
        let verdict = run_one(FakeBehavior::TimedOut, &tmp).await;
        assert_eq!(verdict.resolved, Resolution::Timeout);
    }

    #[tokio::test]
    async fn resume_skips_a_completed_instance() {
        let tmp = camino_tempfile::Utf8TempDir::new().unwrap();
        let _ = run_one(FakeBehavior::Succeed { log: "pkg.T::m1 PASSED\npkg.T::m2 PASSED\n".to_string() }, &tmp)
            .await;

        let engine: Arc<dyn ContainerEngine> = Arc::new(FakeEngine::new(FakeBehavior::TimedOut));
        let profiles = Arc::new(ProfileTable::load(None).unwrap());
        let options = SchedulerOptions {
            max_workers: 2,
            run_id: "run-1".to_string(),
            results_root: tmp.path().to_owned(),
            force_rebuild: false,
            cache_level: CacheLevel::All,
            namespace: String::new(),
            timeout_override: None,
        };
        let scheduler = Scheduler::new(engine, profiles, options);
        let instances = vec![instance("pkg__pkg-1", &["pkg.T::m1"], &["pkg.T::m2"])];
        let (fut, _rx, _cancel) = scheduler.run(instances);
        let summary = fut.await;
        // The cached verdict (resolved) is returned, not a fresh timeout,
        // because resume short-circuits on the existing verdict.json.
        assert_eq!(summary.verdicts[0].resolved, Resolution::Resolved);
    }
}
