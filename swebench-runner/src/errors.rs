// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the evaluation harness.
//!
//! Each fallible component owns one leaf error type here. Every type
//! implements [`HarnessError::reason`] so the Scheduler can always produce a
//! `verdict.json` from an error it did not specifically pattern-match.

use swebench_metadata::Reason;

/// Common behaviour every leaf error in this module provides: a stable,
/// machine-readable [`Reason`] tag to stamp onto a `Verdict`.
pub trait HarnessError {
    fn reason(&self) -> Reason;
}

/// The Specification Resolver failed to find a profile for an instance.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no profile matches repo `{repo}` version `{version:?}`")]
    UnknownRepo { repo: String, version: Option<String> },
    #[error("instance `{instance_id}` has overlapping FAIL_TO_PASS/PASS_TO_PASS sets")]
    OverlappingTestSets {
        instance_id: String,
        #[source]
        source: swebench_metadata::OverlappingTestSetsError,
    },
}

impl HarnessError for ResolveError {
    fn reason(&self) -> Reason {
        Reason::UnknownProfile
    }
}

/// An image build (base, env, or instance level) failed.
///
/// `Clone` so a failed build graph promise can be shared across every
/// waiter who requested the same key (§4.2 "a `failed` promise is cached
/// for the lifetime of the process").
#[derive(Clone, Debug, thiserror::Error)]
#[error("image build failed at `{level}` level for key `{key}`: {log}")]
pub struct BuildError {
    pub level: &'static str,
    pub key: String,
    pub log: String,
}

impl HarnessError for BuildError {
    fn reason(&self) -> Reason {
        Reason::ImageBuildFailed
    }
}

/// The patch (or `test_patch`) did not apply cleanly.
#[derive(Debug, thiserror::Error)]
#[error("patch failed to apply: {rejects}")]
pub struct PatchError {
    pub rejects: String,
}

impl HarnessError for PatchError {
    fn reason(&self) -> Reason {
        Reason::PatchFailed
    }
}

/// The eval script exited nonzero and no tests were observed.
#[derive(Debug, thiserror::Error)]
#[error("eval script exited with code {exit_code} and no tests were observed")]
pub struct RunError {
    pub exit_code: i32,
}

impl HarnessError for RunError {
    fn reason(&self) -> Reason {
        Reason::RunFailed
    }
}

/// The eval script exceeded its wall-clock budget.
#[derive(Debug, thiserror::Error)]
#[error("eval script exceeded its {budget:?} timeout")]
pub struct TimeoutError {
    pub budget: std::time::Duration,
}

impl HarnessError for TimeoutError {
    fn reason(&self) -> Reason {
        Reason::TimedOut
    }
}

/// Captured logs could not be parsed, or no tests were observed despite a
/// clean exit.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no parser registered for id `{0}`")]
    UnknownParser(String),
    #[error("malformed report: {0}")]
    Malformed(String),
    #[error("no tests were observed in the captured output")]
    NoTestsObserved,
}

impl HarnessError for ParseError {
    fn reason(&self) -> Reason {
        Reason::Unparseable
    }
}

/// The container engine itself is unavailable or unhealthy.
///
/// Unlike the other error kinds, an `EngineError` is not necessarily
/// specific to one instance: the Scheduler treats a persistent engine
/// failure as fatal for the whole run (exit code 1), per the propagation
/// policy.
#[derive(Debug, thiserror::Error)]
#[error("container engine error: {0}")]
pub struct EngineError(pub String);

impl HarnessError for EngineError {
    fn reason(&self) -> Reason {
        // An EngineError that reaches the per-instance verdict path (as
        // opposed to aborting the whole run) is indistinguishable from a
        // run that could not produce output.
        Reason::RunFailed
    }
}

/// The union of every way evaluating a single instance can fail, used as
/// the error type of the Scheduler's per-instance pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl InstanceError {
    pub fn reason(&self) -> Reason {
        match self {
            InstanceError::Resolve(e) => e.reason(),
            InstanceError::Build(e) => e.reason(),
            InstanceError::Patch(e) => e.reason(),
            InstanceError::Run(e) => e.reason(),
            InstanceError::Timeout(e) => e.reason(),
            InstanceError::Parse(e) => e.reason(),
            InstanceError::Engine(e) => e.reason(),
        }
    }

    /// The [`swebench_metadata::Resolution`] this error maps to, paired
    /// with [`InstanceError::reason`] to build a complete `Verdict`.
    pub fn resolution(&self) -> swebench_metadata::Resolution {
        use swebench_metadata::Resolution;
        match self {
            InstanceError::Resolve(_) | InstanceError::Build(_) | InstanceError::Patch(_) => {
                Resolution::BuildError
            }
            InstanceError::Run(_) | InstanceError::Engine(_) => Resolution::RunError,
            InstanceError::Timeout(_) => Resolution::Timeout,
            InstanceError::Parse(_) => Resolution::ParseError,
        }
    }
}

/// Failure to load or parse the profile table configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigParseError {
    #[error("failed to read profile table from `{path}`")]
    Read {
        path: camino::Utf8PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("failed to deserialize profile table: {0}")]
    Deserialize(#[source] config::ConfigError),
}

/// Failure to persist or load a run record file under `results/`.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("failed to write `{path}`")]
    Write {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read `{path}`")]
    Read {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize record for `{path}`")]
    Serialize {
        path: camino::Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
