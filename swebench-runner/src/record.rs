// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk `results/<run_id>/<instance_id>/` persistence layer
//! (SPEC_FULL.md §6): `spec.json`, `run.log`, `report.xml`, `parsed.json`,
//! and `verdict.json`, plus the `summary.json` aggregate. `verdict.json`
//! is the commit marker: its presence means the instance is complete,
//! which is what Resume (§4.7) checks for.
//!
//! Every write is a full atomic replace (write-to-temp + rename, via
//! `atomicwrites`) so a crash mid-write loses at most the in-flight file,
//! never corrupts a previously committed one.

use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::io::Write;
use swebench_metadata::{Instance, ParsedResult, SchemaVersion, TestSpec, Verdict};

use crate::errors::RecordError;

/// The root of one run's result tree: `<root>/<run_id>/`.
#[derive(Clone, Debug)]
pub struct RunRoot {
    root: Utf8PathBuf,
}

impl RunRoot {
    pub fn new(root: impl Into<Utf8PathBuf>, run_id: &str) -> Self {
        Self { root: root.into().join(run_id) }
    }

    pub fn instance_dir(&self, instance_id: &str) -> InstanceDir {
        InstanceDir { path: self.root.join(instance_id) }
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.root.join("summary.json")
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// The result directory for one instance: `<run_id>/<instance_id>/`.
#[derive(Clone, Debug)]
pub struct InstanceDir {
    path: Utf8PathBuf,
}

impl InstanceDir {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// `verdict.json` is the commit marker (§6); Resume (§4.7) treats its
    /// presence as "this instance is complete" for the current `run_id`.
    pub fn is_complete(&self) -> bool {
        self.path.join("verdict.json").is_file()
    }

    pub fn write_spec(&self, spec: &TestSpec) -> Result<(), RecordError> {
        self.write_json("spec.json", spec)
    }

    pub fn write_log(&self, log: &str) -> Result<(), RecordError> {
        self.write_bytes("run.log", log.as_bytes())
    }

    pub fn write_report(&self, report: &[u8]) -> Result<(), RecordError> {
        self.write_bytes("report.xml", report)
    }

    pub fn write_parsed(&self, parsed: &ParsedResult) -> Result<(), RecordError> {
        self.write_json("parsed.json", parsed)
    }

    /// Writing `verdict.json` commits the instance; call this last.
    pub fn write_verdict(&self, verdict: &Verdict) -> Result<(), RecordError> {
        self.write_json("verdict.json", verdict)
    }

    pub fn read_verdict(&self) -> Result<Verdict, RecordError> {
        let path = self.path.join("verdict.json");
        let text = fs_err::read_to_string(&path)
            .map_err(|source| RecordError::Read { path: path.clone(), source })?;
        serde_json::from_str(&text).map_err(|source| RecordError::Serialize { path, source })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), RecordError> {
        let path = self.path.join(name);
        let body = serde_json::to_vec_pretty(value)
            .map_err(|source| RecordError::Serialize { path: path.clone(), source })?;
        self.write_bytes(name, &body)
    }

    fn write_bytes(&self, name: &str, body: &[u8]) -> Result<(), RecordError> {
        fs_err::create_dir_all(&self.path)
            .map_err(|source| RecordError::Write { path: self.path.clone(), source })?;
        let path = self.path.join(name);
        let file = AtomicFile::new(&path, AllowOverwrite);
        file.write(|f| f.write_all(body))
            .map_err(|e| RecordError::Write { path, source: std::io::Error::other(e.to_string()) })
    }
}

/// The aggregate counts and per-instance verdicts written to
/// `<run_id>/summary.json` once the Scheduler drains its queue (§6).
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub schema_version: SchemaVersion,
    pub run_id: String,
    pub total: usize,
    pub resolved: usize,
    pub partially_resolved: usize,
    pub unresolved: usize,
    pub errored: usize,
    pub verdicts: Vec<Verdict>,
}

impl Summary {
    pub fn from_verdicts(run_id: impl Into<String>, verdicts: Vec<Verdict>) -> Self {
        use swebench_metadata::Resolution;
        let mut resolved = 0;
        let mut partially_resolved = 0;
        let mut unresolved = 0;
        let mut errored = 0;
        for v in &verdicts {
            match v.resolved {
                Resolution::Resolved => resolved += 1,
                Resolution::PartiallyResolved => partially_resolved += 1,
                Resolution::Unresolved => unresolved += 1,
                _ => errored += 1,
            }
        }
        Self {
            schema_version: SchemaVersion::CURRENT,
            run_id: run_id.into(),
            total: verdicts.len(),
            resolved,
            partially_resolved,
            unresolved,
            errored,
            verdicts,
        }
    }

    pub fn write(&self, root: &RunRoot) -> Result<(), RecordError> {
        let path = root.summary_path();
        fs_err::create_dir_all(root.root())
            .map_err(|source| RecordError::Write { path: path.clone(), source })?;
        let body = serde_json::to_vec_pretty(self)
            .map_err(|source| RecordError::Serialize { path: path.clone(), source })?;
        let file = AtomicFile::new(&path, AllowOverwrite);
        file.write(|f| f.write_all(&body))
            .map_err(|e| RecordError::Write { path, source: std::io::Error::other(e.to_string()) })
    }
}

/// Writes a structured report to `dir/report.xml` if present, returning
/// the single-element (or empty) `report_blobs` list the parsers (§4.4)
/// expect. Shared by the Scheduler (writing into an instance's permanent
/// result directory) and the Test Collector (writing into an ephemeral
/// temp directory for a single collection pass).
pub fn materialize_report(
    dir: &Utf8Path,
    report: Option<&[u8]>,
) -> Result<Vec<Utf8PathBuf>, RecordError> {
    let Some(bytes) = report else { return Ok(Vec::new()) };
    fs_err::create_dir_all(dir).map_err(|source| RecordError::Write { path: dir.to_owned(), source })?;
    let path = dir.join("report.xml");
    fs_err::write(&path, bytes).map_err(|source| RecordError::Write { path: path.clone(), source })?;
    Ok(vec![path])
}

/// Atomically rewrites the Test Collector's output dataset to `path`
/// (§4.5 step 4): write-to-temp + rename via `atomicwrites`, the same
/// discipline [`InstanceDir`] uses for its own files, so an interruption
/// mid-write loses at most the in-flight instance rather than corrupting
/// labels already committed from an earlier pass.
pub fn write_instances_atomic(path: &Utf8Path, instances: &[Instance]) -> Result<(), RecordError> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)
            .map_err(|source| RecordError::Write { path: path.to_owned(), source })?;
    }
    let body = serde_json::to_vec_pretty(instances)
        .map_err(|source| RecordError::Serialize { path: path.to_owned(), source })?;
    let file = AtomicFile::new(path, AllowOverwrite);
    file.write(|f| f.write_all(&body))
        .map_err(|e| RecordError::Write { path: path.to_owned(), source: std::io::Error::other(e.to_string()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use swebench_metadata::{Resolution, Timings};

    #[test]
    fn instance_is_not_complete_until_verdict_is_written() {
        let tmp = Utf8TempDir::new().unwrap();
        let root = RunRoot::new(tmp.path().to_owned(), "run-1");
        let dir = root.instance_dir("pkg__pkg-1");
        assert!(!dir.is_complete());

        dir.write_log("hello\n").unwrap();
        assert!(!dir.is_complete());

        let verdict = Verdict::graded("pkg__pkg-1", Resolution::Resolved, Timings::default());
        dir.write_verdict(&verdict).unwrap();
        assert!(dir.is_complete());

        let read_back = dir.read_verdict().unwrap();
        assert_eq!(read_back.instance_id, "pkg__pkg-1");
    }

    #[test]
    fn summary_counts_match_verdict_resolutions() {
        let tmp = Utf8TempDir::new().unwrap();
        let root = RunRoot::new(tmp.path().to_owned(), "run-1");
        let verdicts = vec![
            Verdict::graded("a", Resolution::Resolved, Timings::default()),
            Verdict::graded("b", Resolution::Unresolved, Timings::default()),
            Verdict::errored("c", Resolution::Timeout, swebench_metadata::Reason::TimedOut, "timed out"),
        ];
        let summary = Summary::from_verdicts("run-1", verdicts);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.errored, 1);
        summary.write(&root).unwrap();
        assert!(root.summary_path().is_file());
    }

    fn instance(id: &str) -> Instance {
        use std::collections::BTreeSet;
        use swebench_metadata::Language;
        Instance {
            instance_id: id.to_string(),
            repo: "pkg/pkg".to_string(),
            base_commit: "abc123".to_string(),
            patch: String::new(),
            test_patch: String::new(),
            version: "1.0".to_string(),
            language: Language::Python,
            environment_setup_commit: None,
            fail_to_pass: BTreeSet::new(),
            pass_to_pass: BTreeSet::new(),
        }
    }

    #[test]
    fn write_instances_atomic_round_trips() {
        let tmp = Utf8TempDir::new().unwrap();
        let path = tmp.path().join("collected.json");
        let instances = vec![instance("pkg__pkg-1"), instance("pkg__pkg-2")];
        write_instances_atomic(&path, &instances).unwrap();

        let text = fs_err::read_to_string(&path).unwrap();
        let read_back: Vec<Instance> = serde_json::from_str(&text).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].instance_id, "pkg__pkg-1");
    }

    #[test]
    fn write_instances_atomic_overwrites_a_prior_partial_run() {
        let tmp = Utf8TempDir::new().unwrap();
        let path = tmp.path().join("collected.json");
        write_instances_atomic(&path, &[instance("pkg__pkg-1")]).unwrap();
        write_instances_atomic(&path, &[instance("pkg__pkg-1"), instance("pkg__pkg-2")]).unwrap();

        let text = fs_err::read_to_string(&path).unwrap();
        let read_back: Vec<Instance> = serde_json::from_str(&text).unwrap();
        assert_eq!(read_back.len(), 2);
    }
}
