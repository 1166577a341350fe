// SPDX-License-Identifier: MIT OR Apache-2.0

//! The command surface (SPEC_FULL.md §6): invariants, not flag spelling —
//! required dataset/predictions/run-id, optional concurrency and cache
//! knobs, all wired straight into [`swebench_runner::SchedulerOptions`].

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use std::time::Duration;
use swebench_metadata::CacheLevel;

#[derive(Debug, Parser)]
#[command(name = "swebench", about = "Run a SWE-bench-style evaluation harness over a dataset and predictions file.")]
pub struct SwebenchCli {
    /// Path to the dataset file: a JSON array of Instance records (§3, §6).
    #[arg(long, value_name = "PATH")]
    pub dataset: Utf8PathBuf,

    /// Path to the predictions file: a JSON object mapping `instance_id` to
    /// patch text (§6 "predictions path").
    #[arg(long, value_name = "PATH")]
    pub predictions: Utf8PathBuf,

    /// Output namespace for this run; results land under
    /// `<results-root>/<run-id>/` (§6).
    #[arg(long, value_name = "ID")]
    pub run_id: String,

    /// Root directory results are written under.
    #[arg(long, value_name = "PATH", default_value = "results")]
    pub results_root: Utf8PathBuf,

    /// Optional overlay profile table, layered on top of the built-in
    /// defaults (§4.1).
    #[arg(long, value_name = "PATH")]
    pub profiles: Option<Utf8PathBuf>,

    /// Maximum number of instances evaluated concurrently (§5).
    #[arg(long, default_value_t = 8)]
    pub max_workers: usize,

    /// Per-instance eval script wall-clock budget, in seconds. Overrides
    /// every matched profile's own timeout when set.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Restrict the run to these instance ids (repeatable).
    #[arg(long = "instance-id", value_name = "ID")]
    pub instance_ids: Vec<String>,

    /// Re-evaluate instances even if a `verdict.json` already exists for
    /// this `run_id` (disables Resume).
    #[arg(long)]
    pub force_rebuild: bool,

    /// Image cache eviction policy (§4.2, §6).
    #[arg(long, value_enum, default_value_t = CacheLevelArg::Instance)]
    pub cache_level: CacheLevelArg,

    /// Image-registry prefix applied to every image this run builds.
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub namespace: String,

    /// Populate FAIL_TO_PASS/PASS_TO_PASS via the two-pass Test Collector
    /// (§4.5) instead of running the normal grading pipeline.
    #[arg(long)]
    pub collect: bool,

    /// Output dataset path the Test Collector atomically rewrites after
    /// each instance completes (§4.5 step 4). Required with `--collect`.
    /// If the file already exists, instances it carries non-empty
    /// FAIL_TO_PASS/PASS_TO_PASS for are skipped unless `--force-rebuild`
    /// is also set.
    #[arg(long, value_name = "PATH", required_if_eq("collect", "true"))]
    pub collect_output: Option<Utf8PathBuf>,
}

impl SwebenchCli {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

/// `clap`-facing mirror of [`CacheLevel`]; kept separate so the data model
/// crate doesn't need to depend on `clap`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CacheLevelArg {
    None,
    Base,
    Env,
    Instance,
    All,
}

impl From<CacheLevelArg> for CacheLevel {
    fn from(value: CacheLevelArg) -> Self {
        match value {
            CacheLevelArg::None => CacheLevel::None,
            CacheLevelArg::Base => CacheLevel::Base,
            CacheLevelArg::Env => CacheLevel::Env,
            CacheLevelArg::Instance => CacheLevel::Instance,
            CacheLevelArg::All => CacheLevel::All,
        }
    }
}
