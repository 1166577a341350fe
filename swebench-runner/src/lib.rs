// SPDX-License-Identifier: MIT OR Apache-2.0

//! The evaluation harness core (SPEC_FULL.md §2): the Specification
//! Resolver, Image Builder, Log Parsers, Evaluation Runner, Test Collector,
//! Grader, and Work Scheduler, plus the on-disk `results/` persistence
//! layer that backs Resume and the result output layout (§6).
//!
//! `swebench-cli` is a thin binary over this crate's [`scheduler::Scheduler`]
//! entry point; everything that must be correct under concurrency, tolerant
//! of partial build failures, and deterministic across re-runs lives here.

pub mod build;
pub mod collector;
pub mod engine;
pub mod errors;
pub mod grader;
pub mod keying;
pub mod parsers;
pub mod profile;
pub mod record;
pub mod resolver;
pub mod runner;
pub mod scheduler;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use build::BuildGraph;
pub use profile::ProfileTable;
pub use scheduler::{Scheduler, SchedulerEvent, SchedulerOptions};
