// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Log Parsers (SPEC_FULL.md §4.4): parsers are values, not subclasses.
//! Each concrete parser is a plain `fn(&str, &[Utf8PathBuf]) ->
//! Result<ParsedResult, ParseError>` stored in a registry keyed by
//! [`ParserId`]; adding a language means adding a new value and a profile
//! entry, no open recursion.

use crate::errors::ParseError;
use camino::Utf8PathBuf;
use std::collections::HashMap;
use swebench_metadata::{ParsedResult, ParserId, TestSpec, TestStatus};

pub type ParserFn = fn(&str, &[Utf8PathBuf]) -> Result<ParsedResult, ParseError>;

const JUNIT_XML: &str = "junit_xml";

/// Strips ANSI escapes and trims trailing whitespace from every line.
/// Centralised here so the "line-synchronous, monotone" invariant (§4.4)
/// is enforced once rather than duplicated per parser.
fn canonicalize(log: &str) -> String {
    let stripped = strip_ansi_escapes::strip(log.as_bytes());
    let text = String::from_utf8_lossy(&stripped);
    text.lines().map(|l| l.trim_end()).collect::<Vec<_>>().join("\n")
}

/// `pytest -v` style output: `test_id PASSED|FAILED|ERROR|SKIPPED [ NN%]`.
fn parse_pytest(log: &str, _reports: &[Utf8PathBuf]) -> Result<ParsedResult, ParseError> {
    let text = canonicalize(log);
    let mut result = ParsedResult::new();
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let Some(id) = words.next() else { continue };
        let Some(keyword) = words.next() else { continue };
        let status = match keyword {
            "PASSED" => TestStatus::Passed,
            "FAILED" => TestStatus::Failed,
            "ERROR" => TestStatus::Error,
            "SKIPPED" => TestStatus::Skipped,
            _ => continue,
        };
        if !id.contains("::") && !id.contains('.') {
            continue;
        }
        result.record(id, status);
    }
    if result.is_empty() {
        return Err(ParseError::NoTestsObserved);
    }
    Ok(result)
}

/// `go test -v` style output: `--- PASS: Name (0.00s)` / `--- FAIL: Name`.
fn parse_go_test(log: &str, _reports: &[Utf8PathBuf]) -> Result<ParsedResult, ParseError> {
    let text = canonicalize(log);
    let mut result = ParsedResult::new();
    for line in text.lines() {
        let line = line.trim_start();
        let (status, rest) = if let Some(rest) = line.strip_prefix("--- PASS: ") {
            (TestStatus::Passed, rest)
        } else if let Some(rest) = line.strip_prefix("--- FAIL: ") {
            (TestStatus::Failed, rest)
        } else if let Some(rest) = line.strip_prefix("--- SKIP: ") {
            (TestStatus::Skipped, rest)
        } else {
            continue;
        };
        let name = rest.split_whitespace().next().unwrap_or(rest);
        if name.is_empty() {
            continue;
        }
        result.record(name, status);
    }
    if result.is_empty() {
        return Err(ParseError::NoTestsObserved);
    }
    Ok(result)
}

fn parse_junit_xml(_log: &str, reports: &[Utf8PathBuf]) -> Result<ParsedResult, ParseError> {
    let path = reports
        .first()
        .ok_or_else(|| ParseError::Malformed("no report.xml was produced".to_string()))?;
    parse_junit_report(path)
}

fn parse_junit_report(path: &Utf8PathBuf) -> Result<ParsedResult, ParseError> {
    let xml = fs_err::read_to_string(path).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let report =
        swebench_junit::parse_str(&xml).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let parsed = report.to_parsed_result();
    if parsed.is_empty() {
        return Err(ParseError::NoTestsObserved);
    }
    Ok(parsed)
}

/// The set of parsers known at startup, matching "a constant map built at
/// initialisation" (§9) rather than dynamic dispatch on a parser id string.
pub struct ParserRegistry {
    parsers: HashMap<ParserId, ParserFn>,
}

impl ParserRegistry {
    pub fn with_builtins() -> Self {
        let mut parsers: HashMap<ParserId, ParserFn> = HashMap::new();
        parsers.insert(ParserId("pytest".to_string()), parse_pytest);
        parsers.insert(ParserId("go_test".to_string()), parse_go_test);
        parsers.insert(ParserId(JUNIT_XML.to_string()), parse_junit_xml);
        Self { parsers }
    }

    pub fn get(&self, id: &ParserId) -> Option<ParserFn> {
        self.parsers.get(id).copied()
    }
}

/// Parses a captured eval-script run per `spec.log_parser_id`, then, when
/// that parser isn't itself the structured one, folds in any `*.xml`
/// report blob as authoritative — "when both a structured report and a
/// text stream exist, the structured report wins" (§4.4).
pub fn parse(
    spec: &TestSpec,
    log: &str,
    report_blobs: &[Utf8PathBuf],
) -> Result<ParsedResult, ParseError> {
    let registry = ParserRegistry::with_builtins();
    let parse_fn = registry
        .get(&spec.log_parser_id)
        .ok_or_else(|| ParseError::UnknownParser(spec.log_parser_id.0.clone()))?;

    let mut result = match parse_fn(log, report_blobs) {
        Ok(result) => result,
        Err(_) if spec.log_parser_id.0 != JUNIT_XML => ParsedResult::new(),
        Err(e) => return Err(e),
    };

    if spec.log_parser_id.0 != JUNIT_XML {
        for path in report_blobs.iter().filter(|p| p.extension() == Some("xml")) {
            if let Ok(structured) = parse_junit_report(path) {
                result.merge_authoritative(&structured);
            }
        }
    }

    if result.is_empty() {
        return Err(ParseError::NoTestsObserved);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pytest_parser_reads_verbose_output() {
        let log = "\
tests/test_foo.py::test_a PASSED [ 50%]
tests/test_foo.py::test_b FAILED [100%]
";
        let parsed = parse_pytest(log, &[]).unwrap();
        assert_eq!(parsed.status_of("tests/test_foo.py::test_a"), Some(TestStatus::Passed));
        assert_eq!(parsed.status_of("tests/test_foo.py::test_b"), Some(TestStatus::Failed));
    }

    #[test]
    fn pytest_parser_strips_ansi_colour_codes() {
        let log = "\u{1b}[32mtests/test_foo.py::test_a PASSED\u{1b}[0m [100%]\n";
        let parsed = parse_pytest(log, &[]).unwrap();
        assert_eq!(parsed.status_of("tests/test_foo.py::test_a"), Some(TestStatus::Passed));
    }

    #[test]
    fn pytest_parser_is_monotone_last_write_wins() {
        let log = "\
pkg.T::m1 FAILED
pkg.T::m1 PASSED
";
        let parsed = parse_pytest(log, &[]).unwrap();
        assert_eq!(parsed.status_of("pkg.T::m1"), Some(TestStatus::Passed));
    }

    #[test]
    fn pytest_parser_errors_when_nothing_observed() {
        assert!(matches!(
            parse_pytest("no tests ran\n", &[]),
            Err(ParseError::NoTestsObserved)
        ));
    }

    #[test]
    fn go_test_parser_reads_pass_and_fail_markers() {
        let log = "\
=== RUN   TestAdd
--- PASS: TestAdd (0.00s)
=== RUN   TestSub
--- FAIL: TestSub (0.01s)
";
        let parsed = parse_go_test(log, &[]).unwrap();
        assert_eq!(parsed.status_of("TestAdd"), Some(TestStatus::Passed));
        assert_eq!(parsed.status_of("TestSub"), Some(TestStatus::Failed));
    }
}
