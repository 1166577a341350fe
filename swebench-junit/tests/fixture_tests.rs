// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::DateTime;
use std::time::Duration;
use swebench_junit::{parse_str, Property, Report, Testcase, TestcaseStatus, Testsuite};

#[test]
fn basic_report_round_trips_through_parse() {
    let report = basic_report();
    let xml = report.to_string().expect("serializing basic_report succeeds");

    insta::assert_snapshot!(xml);

    let parsed = parse_str(&xml).expect("parsing the report we just wrote succeeds");
    assert_eq!(parsed.tests, report.tests);
    assert_eq!(parsed.failures, report.failures);
    assert_eq!(parsed.errors, report.errors);
    assert_eq!(parsed.testsuites.len(), report.testsuites.len());
    assert_eq!(
        parsed.testsuites[0].testcases.len(),
        report.testsuites[0].testcases.len()
    );
}

#[test]
fn basic_report_flattens_into_parsed_result() {
    let report = basic_report();
    let result = report.to_parsed_result();

    assert_eq!(result.len(), 4);
    assert!(
        result
            .status_of("testsuite0::testcase0")
            .is_some_and(|s| s.is_passed())
    );
    assert!(
        !result
            .status_of("testsuite0::testcase1")
            .is_some_and(|s| s.is_passed())
    );
}

fn basic_report() -> Report {
    let mut report = Report::new("my-test-run");
    report.set_time(Duration::new(42, 234_567_890));

    let mut testsuite = Testsuite::new("testsuite0");
    testsuite.set_timestamp(
        DateTime::parse_from_rfc2822("Thu, 1 Apr 2021 10:52:39 -0800")
            .expect("valid RFC2822 datetime"),
    );

    let testcase_status = TestcaseStatus::success();
    let mut testcase = Testcase::new("testcase0", testcase_status);
    testcase.set_system_out("testcase0-output");
    testsuite.add_testcase(testcase);

    let mut testcase_status = TestcaseStatus::failure();
    testcase_status
        .set_description("this is the failure description")
        .set_message("testcase1-message");
    let mut testcase = Testcase::new("testcase1", testcase_status);
    testcase
        .set_system_err("some sort of failure output")
        .set_time(Duration::from_millis(4242));
    testsuite.add_testcase(testcase);

    let mut testcase_status = TestcaseStatus::error();
    testcase_status
        .set_description("testcase2 error description")
        .set_type("error type");
    let mut testcase = Testcase::new("testcase2", testcase_status);
    testcase.set_time(Duration::from_nanos(421580));
    testsuite.add_testcase(testcase);

    let mut testcase_status = TestcaseStatus::skipped();
    testcase_status
        .set_type("skipped type")
        .set_message("skipped message");
    let mut testcase = Testcase::new("testcase3", testcase_status);
    testcase
        .set_assertions(20)
        .set_system_out("testcase3 output")
        .set_system_err("testcase3 error");
    testsuite.add_testcase(testcase);

    testsuite.add_property(Property::new("env", "FOOBAR"));

    report.add_testsuite(testsuite);
    report
}
