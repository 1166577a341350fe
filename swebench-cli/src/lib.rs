// SPDX-License-Identifier: MIT OR Apache-2.0

//! A thin command-line front end for the evaluation harness in
//! `swebench-runner`: argument parsing, dataset/predictions loading, and
//! terminal progress reporting. Everything that must be correct under
//! concurrency lives in `swebench-runner` instead.

#![warn(missing_docs)]

pub mod cli;
pub mod errors;
pub mod input;
pub mod progress;
