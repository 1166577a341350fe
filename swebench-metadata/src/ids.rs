// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// The schema version stamped into every file under `results/<run_id>/...`.
///
/// Bumped whenever a breaking change is made to `spec.json`, `parsed.json`,
/// `verdict.json`, or `summary.json`. A reader that sees a version newer
/// than [`CURRENT`](SchemaVersion::CURRENT) should refuse to interpret the
/// file rather than guess at its shape.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u16);

impl SchemaVersion {
    /// The schema version produced by this build of the harness.
    pub const CURRENT: SchemaVersion = SchemaVersion(1);
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes a test identifier into its canonical `<suite-or-file>::<name>`
/// form.
///
/// The id is first split on any run of one or more colons, so
/// single-colon separators (`pkg:T:m1`) are repaired to `::` alongside
/// already-canonical ids. Each resulting segment then has its own `.`
/// promoted to `::`, *except* a segment that looks like a file path
/// (contains `/`, e.g. `tests/test_foo.py`) — there a dot is a filename
/// extension, not a separator — and the parameterized suffix of a
/// segment (from the first `[` onward), which is kept verbatim.
///
/// This makes a dotted classname joined onto a name via `::` (as
/// `swebench_junit` builds JUnit ids: `tests.test_foo::test_bar`) and the
/// fully-dotted form of the same id (`tests.test_foo.test_bar`, the
/// motivating case being Django's
/// `module.tests.TestClass.test_method`) canonicalise to the same
/// string, so a grader's lookup against one matches a result recorded
/// under the other.
pub fn canonical_test_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' {
            while chars.peek() == Some(&':') {
                chars.next();
            }
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    segments.push(current);

    segments
        .iter()
        .map(|segment| promote_segment(segment))
        .collect::<Vec<_>>()
        .join("::")
}

/// Promotes `.` to `::` within one colon-delimited segment, unless the
/// segment is a file path or the dot falls inside a parameterized
/// suffix.
fn promote_segment(segment: &str) -> String {
    if segment.contains('/') {
        return segment.to_string();
    }
    match segment.find('[') {
        Some(bracket) => {
            let (name, suffix) = segment.split_at(bracket);
            format!("{}{suffix}", name.replace('.', "::"))
        }
        None => segment.replace('.', "::"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_pytest_style_ids_alone() {
        assert_eq!(
            canonical_test_id("tests/test_foo.py::TestBar::test_baz"),
            "tests/test_foo.py::TestBar::test_baz"
        );
    }

    #[test]
    fn promotes_dots_in_fully_dotted_ids() {
        assert_eq!(canonical_test_id("  pkg.T.m1  "), "pkg::T::m1");
    }

    #[test]
    fn repairs_single_colon_separators() {
        assert_eq!(canonical_test_id("pkg:T:m1"), "pkg::T::m1");
    }

    #[test]
    fn is_idempotent_on_already_canonical_ids() {
        assert_eq!(canonical_test_id("pkg::T::m1"), "pkg::T::m1");
    }

    #[test]
    fn keeps_parameterized_suffix_verbatim() {
        assert_eq!(
            canonical_test_id("test_mod::test_fn[param1-param2]"),
            "test_mod::test_fn[param1-param2]"
        );
    }

    #[test]
    fn junit_classname_joined_id_matches_fully_dotted_form() {
        // `swebench_junit::Report::to_parsed_result` builds
        // `classname::name` from a dotted classname; the dataset's own
        // fully-dotted id for the same test must canonicalise identically.
        assert_eq!(
            canonical_test_id("tests.test_foo::test_bar"),
            canonical_test_id("tests.test_foo.test_bar"),
        );
        assert_eq!(
            canonical_test_id("com.example.FooTest::testBar"),
            canonical_test_id("com.example.FooTest.testBar"),
        );
    }
}
