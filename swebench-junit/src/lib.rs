// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! A JUnit/XUnit XML reader and writer, grown from `quick-junit` to also read
//! back the reports that test harnesses other than `cargo-nextest` produce:
//! `pytest --junit-xml`, Go's `gotestsum --junitfile`, and Maven Surefire.
//!
//! # Overview
//!
//! The root element of a JUnit report is a [`Report`]. A [`Report`] consists
//! of one or more [`Testsuite`] instances, each of which consists of one or
//! more [`Testcase`]s. The status (success, failure, error, or skipped) of a
//! [`Testcase`] is represented by [`TestcaseStatus`].
//!
//! [`Report::serialize`] writes a `Report` out as JUnit XML; [`parse_str`]
//! reads JUnit XML produced by any of the above tools back into a `Report`.
//! [`Report::to_parsed_result`] flattens a parsed report into a
//! `swebench_metadata::ParsedResult`, the canonical `{test_id -> status}` map
//! the rest of the harness works with.
//!
//! # Examples
//!
//! ```rust
//! use swebench_junit::{Report, Testcase, TestcaseStatus, Testsuite};
//!
//! let mut report = Report::new("my-test-run");
//! let mut test_suite = Testsuite::new("my-test-suite");
//! let success_case = Testcase::new("success-case", TestcaseStatus::success());
//! let failure_case = Testcase::new("failure-case", TestcaseStatus::failure());
//! test_suite.add_testcases([success_case, failure_case]);
//! report.add_testsuite(test_suite);
//!
//! let xml = report.to_string().unwrap();
//! let parsed = swebench_junit::parse_str(&xml).unwrap();
//! assert_eq!(parsed.tests, 2);
//! ```

mod convert;
mod errors;
mod read;
mod report;
mod serialize;

pub use errors::SerializeError;
pub use read::{parse_str, JunitParseError};
pub use report::*;

// Re-export `quick_xml::Error` and `Result` so it can be used by downstream consumers.
#[doc(no_inline)]
pub use quick_xml::{Error, Result};
