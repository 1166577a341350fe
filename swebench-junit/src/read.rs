// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse JUnit/XUnit XML (as produced by `pytest --junit-xml`, Go's
//! `gotestsum --junitfile`, and Maven Surefire) back into a [`Report`].
//!
//! The writer side of this crate only ever produces `<testsuites>` wrapping
//! one or more `<testsuite>`, but readers have to cope with both forms: some
//! Surefire configurations emit a single bare `<testsuite>` as the document
//! root. [`parse_str`] accepts either.

use crate::{Output, Property, Report, Testcase, TestcaseStatus, Testsuite};
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use std::time::Duration;
use thiserror::Error;

/// An error encountered while parsing JUnit XML into a [`Report`].
#[derive(Debug, Error)]
pub enum JunitParseError {
    #[error("malformed XML at byte offset {offset}")]
    Xml {
        offset: usize,
        #[source]
        inner: quick_xml::Error,
    },
    #[error("unexpected element `{0}` outside of a testsuites/testsuite document")]
    UnexpectedRoot(String),
    #[error("unexpected element `{tag}` inside <{parent}>")]
    UnexpectedElement { tag: String, parent: &'static str },
    #[error("<testcase> outside of a <testsuite>")]
    TestcaseOutsideSuite,
    #[error("invalid numeric attribute `{name}` with value `{value}`")]
    InvalidAttribute { name: &'static str, value: String },
}

/// Parses a complete JUnit XML document into a [`Report`].
pub fn parse_str(input: &str) -> Result<Report, JunitParseError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text = true;

    let mut report: Option<Report> = None;
    let mut current_suite: Option<Testsuite> = None;
    let mut current_case: Option<Testcase> = None;
    // `(tag, message, ty)` for the failure/error/skipped child currently open inside a testcase.
    let mut current_status: Option<(&'static str, Option<String>, Option<String>)> = None;
    let mut text_buf = String::new();

    loop {
        let pos = reader.buffer_position() as usize;
        match reader
            .read_event()
            .map_err(|inner| JunitParseError::Xml { offset: pos, inner })?
        {
            Event::Start(tag) => {
                let name = local_name(&tag);
                handle_start(
                    &name,
                    &tag,
                    &mut report,
                    &mut current_suite,
                    &mut current_case,
                    &mut current_status,
                )?;
            }
            // A self-closing tag never gets a matching `Event::End`, so run
            // both halves of the state machine back to back for it.
            Event::Empty(tag) => {
                let name = local_name(&tag);
                handle_start(
                    &name,
                    &tag,
                    &mut report,
                    &mut current_suite,
                    &mut current_case,
                    &mut current_status,
                )?;
                handle_end(
                    &name,
                    String::new(),
                    &mut report,
                    &mut current_suite,
                    &mut current_case,
                    &mut current_status,
                )?;
            }
            Event::Text(t) => {
                text_buf.push_str(&t.unescape().unwrap_or_default());
            }
            Event::CData(t) => {
                text_buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(tag) => {
                let name = local_name_bytes_end(&tag);
                handle_end(
                    &name,
                    std::mem::take(&mut text_buf),
                    &mut report,
                    &mut current_suite,
                    &mut current_case,
                    &mut current_status,
                )?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    report.ok_or_else(|| JunitParseError::UnexpectedRoot(String::new()))
}

fn local_name(tag: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn local_name_bytes_end(tag: &quick_xml::events::BytesEnd<'_>) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).into_owned()
}

fn attr(tag: &BytesStart<'_>, name: &str) -> Option<String> {
    tag.attributes().flatten().find_map(|a| {
        if a.key.local_name().as_ref() == name.as_bytes() {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}

fn attr_usize(tag: &BytesStart<'_>, name: &'static str) -> Result<Option<usize>, JunitParseError> {
    match attr(tag, name) {
        Some(v) => v
            .parse::<f64>()
            .map(|f| Some(f as usize))
            .map_err(|_| JunitParseError::InvalidAttribute { name, value: v }),
        None => Ok(None),
    }
}

fn attr_duration(tag: &BytesStart<'_>, name: &'static str) -> Result<Option<Duration>, JunitParseError> {
    match attr(tag, name) {
        Some(v) => v
            .parse::<f64>()
            .map(Duration::from_secs_f64)
            .map(Some)
            .map_err(|_| JunitParseError::InvalidAttribute { name, value: v }),
        None => Ok(None),
    }
}

fn handle_start(
    name: &str,
    tag: &BytesStart<'_>,
    report: &mut Option<Report>,
    current_suite: &mut Option<Testsuite>,
    current_case: &mut Option<Testcase>,
    current_status: &mut Option<(&'static str, Option<String>, Option<String>)>,
) -> Result<(), JunitParseError> {
    match name {
        "testsuites" => {
            let mut r = Report::new(attr(tag, "name").unwrap_or_default());
            if let Some(time) = attr_duration(tag, "time")? {
                r.set_time(time);
            }
            *report = Some(r);
        }
        "testsuite" => {
            if report.is_none() {
                // Bare `<testsuite>` as document root (Surefire).
                *report = Some(Report::new("testsuite"));
            }
            let mut suite = Testsuite::new(attr(tag, "name").unwrap_or_default());
            if let Some(time) = attr_duration(tag, "time")? {
                suite.set_time(time);
            }
            if let Some(timestamp) = attr(tag, "timestamp") {
                if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(&timestamp) {
                    suite.set_timestamp(ts);
                }
            }
            *current_suite = Some(suite);
        }
        "properties" => {}
        "property" => {
            let suite = current_suite
                .as_mut()
                .ok_or(JunitParseError::UnexpectedElement {
                    tag: "property".to_string(),
                    parent: "testsuite",
                })?;
            suite.add_property(Property::new(
                attr(tag, "name").unwrap_or_default(),
                attr(tag, "value").unwrap_or_default(),
            ));
        }
        "testcase" => {
            let mut case = Testcase::new(attr(tag, "name").unwrap_or_default(), TestcaseStatus::Success);
            if let Some(classname) = attr(tag, "classname") {
                case.set_classname(classname);
            }
            if let Some(assertions) = attr_usize(tag, "assertions")? {
                case.set_assertions(assertions);
            }
            if let Some(time) = attr_duration(tag, "time")? {
                case.set_time(time);
            }
            *current_case = Some(case);
        }
        "failure" | "error" | "skipped" => {
            if current_case.is_none() {
                return Err(JunitParseError::TestcaseOutsideSuite);
            }
            let tag_name = match name {
                "failure" => "failure",
                "error" => "error",
                _ => "skipped",
            };
            *current_status = Some((tag_name, attr(tag, "message"), attr(tag, "type")));
        }
        "system-out" | "system-err" => {}
        other => {
            return Err(JunitParseError::UnexpectedElement {
                tag: other.to_string(),
                parent: if current_case.is_some() {
                    "testcase"
                } else if current_suite.is_some() {
                    "testsuite"
                } else {
                    "testsuites"
                },
            });
        }
    }
    Ok(())
}

fn handle_end(
    name: &str,
    text: String,
    report: &mut Option<Report>,
    current_suite: &mut Option<Testsuite>,
    current_case: &mut Option<Testcase>,
    current_status: &mut Option<(&'static str, Option<String>, Option<String>)>,
) -> Result<(), JunitParseError> {
    match name {
        "failure" | "error" | "skipped" => {
            if let Some((tag_name, message, ty)) = current_status.take() {
                let description = (!text.trim().is_empty()).then(|| text.clone());
                let mut status = match tag_name {
                    "failure" => TestcaseStatus::failure(),
                    "error" => TestcaseStatus::error(),
                    _ => TestcaseStatus::skipped(),
                };
                if let Some(message) = message {
                    status.set_message(message);
                }
                if let Some(ty) = ty {
                    status.set_type(ty);
                }
                if let Some(description) = description {
                    status.set_description(description);
                }
                if let Some(case) = current_case.as_mut() {
                    case.status = status;
                }
            }
        }
        "system-out" => {
            if let Some(case) = current_case.as_mut() {
                case.system_out = Some(output(text));
            } else if let Some(suite) = current_suite.as_mut() {
                suite.system_out = Some(output(text));
            }
        }
        "system-err" => {
            if let Some(case) = current_case.as_mut() {
                case.system_err = Some(output(text));
            } else if let Some(suite) = current_suite.as_mut() {
                suite.system_err = Some(output(text));
            }
        }
        "testcase" => {
            if let Some(case) = current_case.take() {
                let suite = current_suite
                    .as_mut()
                    .ok_or(JunitParseError::TestcaseOutsideSuite)?;
                suite.add_testcase(case);
            }
        }
        "testsuite" => {
            if let Some(suite) = current_suite.take() {
                let r = report.get_or_insert_with(|| Report::new("testsuite"));
                r.add_testsuite(suite);
            }
        }
        "testsuites" => {}
        _ => {}
    }
    Ok(())
}

fn output(text: String) -> Output {
    Output { output: text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pytest_style_report() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
    <testsuite name="pytest" tests="2" errors="0" failures="1" time="1.234">
        <testcase classname="tests.test_foo" name="test_bar" time="0.5" />
        <testcase classname="tests.test_foo" name="test_baz" time="0.1">
            <failure message="assert 1 == 2" type="AssertionError">traceback text</failure>
        </testcase>
    </testsuite>
</testsuites>
"#;
        let report = parse_str(xml).unwrap();
        assert_eq!(report.testsuites.len(), 1);
        let suite = &report.testsuites[0];
        assert_eq!(suite.testcases.len(), 2);
        assert!(matches!(suite.testcases[0].status, TestcaseStatus::Success));
        assert!(matches!(
            suite.testcases[1].status,
            TestcaseStatus::Failure { .. }
        ));
    }

    #[test]
    fn parses_bare_testsuite_root() {
        let xml = r#"<testsuite name="surefire" tests="1" errors="0" failures="0">
    <testcase classname="com.example.FooTest" name="testBar" time="0.01" />
</testsuite>"#;
        let report = parse_str(xml).unwrap();
        assert_eq!(report.testsuites.len(), 1);
        assert_eq!(report.testsuites[0].testcases.len(), 1);
    }

    #[test]
    fn parses_skipped_and_error_statuses() {
        let xml = r#"<testsuites>
    <testsuite name="go" tests="2" errors="1" failures="0">
        <testcase classname="pkg" name="TestSkipMe" time="0">
            <skipped message="short mode"></skipped>
        </testcase>
        <testcase classname="pkg" name="TestPanics" time="0.02">
            <error message="panic: boom" type="panic"></error>
        </testcase>
    </testsuite>
</testsuites>"#;
        let report = parse_str(xml).unwrap();
        let suite = &report.testsuites[0];
        assert!(matches!(suite.testcases[0].status, TestcaseStatus::Skipped { .. }));
        assert!(matches!(suite.testcases[1].status, TestcaseStatus::Error { .. }));
    }
}
