// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dataset and predictions loading (SPEC_FULL.md §6 "Dataset input").
//! Deliberately thin: schema validation beyond what `serde` gives for
//! free is named out of scope (§1 Non-goals).

use crate::errors::CliError;
use std::collections::{BTreeMap, HashSet};
use swebench_metadata::Instance;

/// Loads the dataset, applies each instance's predicted patch from
/// `predictions`, and filters to `instance_ids` when non-empty.
///
/// Instances absent from `predictions` are dropped rather than evaluated
/// with an empty patch — an empty patch would otherwise silently grade
/// as "no change applied", which is a different outcome than "no
/// prediction was submitted for this instance".
pub fn load_instances(
    dataset_path: &camino::Utf8Path,
    predictions_path: &camino::Utf8Path,
    instance_ids: &[String],
) -> Result<Vec<Instance>, CliError> {
    let dataset_text =
        fs_err::read_to_string(dataset_path).map_err(|source| CliError::ReadDataset {
            path: dataset_path.to_owned(),
            source,
        })?;
    let mut instances: Vec<Instance> =
        serde_json::from_str(&dataset_text).map_err(|source| CliError::ParseDataset {
            path: dataset_path.to_owned(),
            source,
        })?;

    let predictions_text =
        fs_err::read_to_string(predictions_path).map_err(|source| CliError::ReadPredictions {
            path: predictions_path.to_owned(),
            source,
        })?;
    let predictions: BTreeMap<String, String> =
        serde_json::from_str(&predictions_text).map_err(|source| CliError::ParsePredictions {
            path: predictions_path.to_owned(),
            source,
        })?;

    instances.retain_mut(|instance| match predictions.get(&instance.instance_id) {
        Some(patch) => {
            instance.patch = patch.clone();
            true
        }
        None => false,
    });

    if !instance_ids.is_empty() {
        let wanted: HashSet<&str> = instance_ids.iter().map(String::as_str).collect();
        instances.retain(|instance| wanted.contains(instance.instance_id.as_str()));
    }

    if instances.is_empty() {
        return Err(CliError::EmptyInstanceSelection);
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use swebench_metadata::Language;

    fn write(dir: &camino::Utf8Path, name: &str, contents: &str) -> camino::Utf8PathBuf {
        let path = dir.join(name);
        fs_err::write(&path, contents).unwrap();
        path
    }

    fn instance_json(id: &str) -> String {
        format!(
            r#"{{"instance_id":"{id}","repo":"pkg/pkg","base_commit":"abc123","patch":"","version":"1.0","language":"python","fail_to_pass":["pkg.T::m1"],"pass_to_pass":[]}}"#
        )
    }

    #[test]
    fn instances_without_a_prediction_are_dropped() {
        let tmp = Utf8TempDir::new().unwrap();
        let dataset = write(tmp.path(), "dataset.json", &format!("[{}]", instance_json("pkg__pkg-1")));
        let predictions = write(tmp.path(), "preds.json", "{}");
        let err = load_instances(&dataset, &predictions, &[]).unwrap_err();
        assert!(matches!(err, CliError::EmptyInstanceSelection));
    }

    #[test]
    fn predicted_patch_is_merged_onto_the_instance() {
        let tmp = Utf8TempDir::new().unwrap();
        let dataset = write(tmp.path(), "dataset.json", &format!("[{}]", instance_json("pkg__pkg-1")));
        let predictions = write(
            tmp.path(),
            "preds.json",
            r#"{"pkg__pkg-1": "diff --git a/x b/x\n"}"#,
        );
        let instances = load_instances(&dataset, &predictions, &[]).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].patch, "diff --git a/x b/x\n");
        assert_eq!(instances[0].language, Language::Python);
    }

    #[test]
    fn instance_id_filter_narrows_the_selection() {
        let tmp = Utf8TempDir::new().unwrap();
        let dataset = write(
            tmp.path(),
            "dataset.json",
            &format!("[{},{}]", instance_json("pkg__pkg-1"), instance_json("pkg__pkg-2")),
        );
        let predictions = write(
            tmp.path(),
            "preds.json",
            r#"{"pkg__pkg-1": "p1", "pkg__pkg-2": "p2"}"#,
        );
        let instances =
            load_instances(&dataset, &predictions, &["pkg__pkg-2".to_string()]).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "pkg__pkg-2");
    }
}
