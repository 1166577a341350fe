// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured data model for the evaluation harness.
//!
//! This crate has no I/O and no async runtime dependency: it is the set of
//! plain, `serde`-serializable types shared by the Specification Resolver,
//! Image Builder, Log Parsers, Evaluation Runner, and Grader, plus the
//! handful of pure helper functions (test-id canonicalisation, instance
//! validation) that operate purely on those types.

mod exit_codes;
mod ids;
mod instance;
mod result;
mod run_record;
mod test_spec;
mod verdict;

pub use exit_codes::HarnessExitCode;
pub use ids::{canonical_test_id, SchemaVersion};
pub use instance::{Instance, Language, OverlappingTestSetsError};
pub use result::{ParsedResult, TestStatus};
pub use run_record::RunRecord;
pub use test_spec::{CacheLevel, CacheLevelParseError, ImageKey, ParserId, TestSpec};
pub use verdict::{Reason, Resolution, Timings, Verdict};
