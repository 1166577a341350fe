// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ids::canonical_test_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The outcome of a single test, as observed by a log parser.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

impl TestStatus {
    pub fn is_passed(self) -> bool {
        matches!(self, TestStatus::Passed)
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
            TestStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A canonicalised `{test_id → status}` map produced by a log parser.
///
/// Insertion is monotone: the last observed status for a test id wins,
/// because reruns within a single eval script invocation are legal (a
/// flaky test retried by the test framework itself, for instance). Test
/// ids are stored in their canonical `<suite-or-file>::<name>` form; see
/// [`canonical_test_id`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParsedResult {
    statuses: BTreeMap<String, TestStatus>,
}

impl ParsedResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or overwrites) the status for `test_id`, after running it
    /// through [`canonical_test_id`].
    pub fn record(&mut self, test_id: &str, status: TestStatus) {
        self.statuses.insert(canonical_test_id(test_id), status);
    }

    /// Merges `other` into `self`. Entries already present in `self` are
    /// only overwritten by entries present in `other` — used to let a
    /// structured report be authoritative while text parsing fills in
    /// the rest, per the Log Parsers contract.
    pub fn merge_authoritative(&mut self, other: &ParsedResult) {
        for (id, status) in &other.statuses {
            self.statuses.insert(id.clone(), *status);
        }
    }

    /// Fills in entries from `other` for test ids `self` does not already
    /// have an opinion on, without overwriting anything already present.
    pub fn fill_missing_from(&mut self, other: &ParsedResult) {
        for (id, status) in &other.statuses {
            self.statuses.entry(id.clone()).or_insert(*status);
        }
    }

    pub fn status_of(&self, test_id: &str) -> Option<TestStatus> {
        self.statuses.get(&canonical_test_id(test_id)).copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TestStatus)> {
        self.statuses.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        self.statuses.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_monotone_last_write_wins() {
        let mut r = ParsedResult::new();
        r.record("pkg.T.m1", TestStatus::Failed);
        r.record("pkg.T.m1", TestStatus::Passed);
        assert_eq!(r.status_of("pkg.T.m1"), Some(TestStatus::Passed));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn merge_authoritative_overwrites() {
        let mut text = ParsedResult::new();
        text.record("a", TestStatus::Failed);
        text.record("b", TestStatus::Passed);

        let mut structured = ParsedResult::new();
        structured.record("a", TestStatus::Passed);

        text.merge_authoritative(&structured);
        assert_eq!(text.status_of("a"), Some(TestStatus::Passed));
        assert_eq!(text.status_of("b"), Some(TestStatus::Passed));
    }

    #[test]
    fn fill_missing_from_does_not_overwrite() {
        let mut structured = ParsedResult::new();
        structured.record("a", TestStatus::Passed);

        let mut text = ParsedResult::new();
        text.record("a", TestStatus::Failed);
        text.record("b", TestStatus::Passed);

        structured.fill_missing_from(&text);
        assert_eq!(structured.status_of("a"), Some(TestStatus::Passed));
        assert_eq!(structured.status_of("b"), Some(TestStatus::Passed));
    }
}
