// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge between the JUnit object model and the harness's own
//! [`ParsedResult`](swebench_metadata::ParsedResult).

use crate::{Report, TestcaseStatus};
use swebench_metadata::{ParsedResult, TestStatus};

impl Report {
    /// Flattens every testcase in this report into a [`ParsedResult`].
    ///
    /// The test id is `classname::name` (or bare `name` when `classname` is
    /// absent); [`ParsedResult::record`] runs it through canonicalisation so
    /// that both pytest's dotted classnames and Go/JUnit's already-double-
    /// colon-separated ids land on the same separator convention used by
    /// `FAIL_TO_PASS` and `PASS_TO_PASS`.
    pub fn to_parsed_result(&self) -> ParsedResult {
        let mut result = ParsedResult::new();
        for suite in &self.testsuites {
            for case in &suite.testcases {
                let raw_id = match &case.classname {
                    Some(classname) => format!("{classname}::{}", case.name),
                    None => case.name.clone(),
                };
                let status = match &case.status {
                    TestcaseStatus::Success => TestStatus::Passed,
                    TestcaseStatus::Failure { .. } => TestStatus::Failed,
                    TestcaseStatus::Error { .. } => TestStatus::Error,
                    TestcaseStatus::Skipped { .. } => TestStatus::Skipped,
                };
                result.record(&raw_id, status);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::read::parse_str;
    use swebench_metadata::TestStatus;

    #[test]
    fn flattens_pytest_report_into_parsed_result() {
        let xml = r#"<testsuites>
    <testsuite name="pytest" tests="2" errors="0" failures="1">
        <testcase classname="tests.test_foo" name="test_bar" />
        <testcase classname="tests.test_foo" name="test_baz">
            <failure message="boom" type="AssertionError">trace</failure>
        </testcase>
    </testsuite>
</testsuites>"#;
        let report = parse_str(xml).unwrap();
        let result = report.to_parsed_result();
        assert_eq!(
            result.status_of("tests::test_foo::test_bar"),
            Some(TestStatus::Passed)
        );
        assert_eq!(
            result.status_of("tests::test_foo::test_baz"),
            Some(TestStatus::Failed)
        );
    }
}
