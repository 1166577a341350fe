// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Specification Resolver (SPEC_FULL.md §4.1): `resolve(instance) ->
//! TestSpec | ResolveError`, pure and deterministic given the profile
//! table.

use crate::errors::ResolveError;
use crate::keying::fingerprint;
use crate::profile::{parser_id, ProfileTable};
use swebench_metadata::{Instance, SchemaVersion, TestSpec};

/// Resolves `instance` against `profiles`, producing the fully rendered
/// [`TestSpec`] the rest of the pipeline consumes.
///
/// Rejects instances whose `FAIL_TO_PASS`/`PASS_TO_PASS` sets overlap
/// (§9 Open Question 1: we do not guess at the intended semantics).
pub fn resolve(instance: &Instance, profiles: &ProfileTable) -> Result<TestSpec, ResolveError> {
    instance
        .validate()
        .map_err(|source| ResolveError::OverlappingTestSets {
            instance_id: instance.instance_id.clone(),
            source,
        })?;

    let profile = profiles
        .resolve(&instance.repo, &instance.version, instance.language)
        .ok_or_else(|| ResolveError::UnknownRepo {
            repo: instance.repo.clone(),
            version: Some(instance.version.clone()),
        })?;

    let base_key = fingerprint(&[&profile.base_image]);
    let env_key = fingerprint(&[
        base_key.0.as_str(),
        &profile.setup_script,
        &instance.repo,
        &instance.version,
    ]);
    let instance_key = fingerprint(&[
        env_key.0.as_str(),
        &profile.install_script,
        &instance.base_commit,
    ]);

    let eval_script_template = profile
        .eval_script_template
        .replace("{test_command}", &profile.test_command);

    Ok(TestSpec {
        schema_version: SchemaVersion::CURRENT,
        instance_id: instance.instance_id.clone(),
        base_image: profile.base_image.clone(),
        base_key,
        env_key,
        instance_key,
        setup_script: profile.setup_script.clone(),
        install_script: profile.install_script.clone(),
        eval_script_template,
        test_command: profile.test_command.clone(),
        timeout: profile.timeout,
        log_parser_id: parser_id(profile),
        fail_to_pass: instance.fail_to_pass.clone(),
        pass_to_pass: instance.pass_to_pass.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use swebench_metadata::Language;

    fn instance(repo: &str, version: &str, language: Language) -> Instance {
        Instance {
            instance_id: "pkg__pkg-1".to_string(),
            repo: repo.to_string(),
            base_commit: "abc123".to_string(),
            patch: String::new(),
            test_patch: String::new(),
            version: version.to_string(),
            language,
            environment_setup_commit: None,
            fail_to_pass: BTreeSet::new(),
            pass_to_pass: BTreeSet::new(),
        }
    }

    #[test]
    fn resolves_known_language_via_fallback() {
        let profiles = ProfileTable::load(None).unwrap();
        let spec = resolve(&instance("some/repo", "1.0", Language::Python), &profiles).unwrap();
        assert_eq!(spec.log_parser_id.0, "pytest");
    }

    #[test]
    fn rejects_overlapping_test_sets() {
        let profiles = ProfileTable::load(None).unwrap();
        let mut i = instance("some/repo", "1.0", Language::Python);
        i.fail_to_pass.insert("pkg.T::m".to_string());
        i.pass_to_pass.insert("pkg.T::m".to_string());
        assert!(matches!(
            resolve(&i, &profiles),
            Err(ResolveError::OverlappingTestSets { .. })
        ));
    }

    #[test]
    fn same_env_inputs_share_an_env_key() {
        let profiles = ProfileTable::load(None).unwrap();
        let a = resolve(&instance("some/repo", "1.0", Language::Python), &profiles).unwrap();
        let mut b_instance = instance("some/repo", "1.0", Language::Python);
        b_instance.instance_id = "pkg__pkg-2".to_string();
        b_instance.base_commit = "def456".to_string();
        let b = resolve(&b_instance, &profiles).unwrap();
        assert_eq!(a.env_key, b.env_key);
        assert_ne!(a.instance_key, b.instance_key);
    }
}
