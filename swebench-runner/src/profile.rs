// SPDX-License-Identifier: MIT OR Apache-2.0

//! The profile table: a constant map built at initialisation (§9 "Profile
//! table as data, not code"), loaded via the `config` crate layered over a
//! TOML file plus built-in defaults, mirroring the teacher's own
//! `NextestConfig` `File` + `include_str!` default-config layering.

use crate::errors::ConfigParseError;
use camino::Utf8Path;
use indexmap::IndexMap;
use serde::Deserialize;
use std::time::Duration;
use swebench_metadata::{Language, ParserId};

/// The built-in profile table, shipped inside the binary so the harness is
/// useful with zero configuration for the languages `swebench-metadata`
/// knows about.
static DEFAULT_PROFILES_TOML: &str = include_str!("default_profiles.toml");

/// One row of the profile table: everything the Resolver needs to turn an
/// `Instance` into a `TestSpec`, for the repositories (or language
/// fallback) it matches.
#[derive(Clone, Debug, Deserialize)]
pub struct Profile {
    /// Base image identifier (e.g. a Docker Hub repo:tag), the root of the
    /// build DAG for every instance this profile matches.
    pub base_image: String,
    /// Dockerfile-like text executed once per `(repo, version)` env layer.
    #[serde(default)]
    pub setup_script: String,
    /// Text executed once per instance layer, after checkout.
    #[serde(default)]
    pub install_script: String,
    /// Template for the script run at evaluation time; `{test_command}` is
    /// substituted with `test_command` and `{patch_path}` with the path
    /// the patch was written to inside the container.
    pub eval_script_template: String,
    /// The test command substituted into `eval_script_template`.
    pub test_command: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    pub log_parser_id: String,
}

fn default_timeout() -> Duration {
    Duration::from_secs(1800)
}

/// The `(repo, version)` or bare `language` key a [`Profile`] is filed
/// under.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(untagged)]
enum ProfileKeyRaw {
    RepoVersion { repo: String, version: String },
    Repo { repo: String },
    Language { language: Language },
}

#[derive(Clone, Debug, Deserialize)]
struct ProfileEntry {
    #[serde(flatten)]
    key: ProfileKeyRaw,
    #[serde(flatten)]
    profile: Profile,
}

#[derive(Clone, Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    profile: Vec<ProfileEntry>,
}

/// Resolution lookup order, per SPEC_FULL.md §4.1: exact `(repo, version)`,
/// then `repo` alone, then bare `language` fallback.
#[derive(Clone, Debug, Default)]
pub struct ProfileTable {
    by_repo_version: IndexMap<(String, String), Profile>,
    by_repo: IndexMap<String, Profile>,
    by_language: IndexMap<Language, Profile>,
}

impl ProfileTable {
    /// Loads the built-in defaults, optionally layered under an
    /// operator-supplied TOML file (later entries win on key collision,
    /// matching the teacher's config-layering convention).
    pub fn load(overlay_path: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let mut builder =
            config::Config::builder().add_source(config::File::from_str(
                DEFAULT_PROFILES_TOML,
                config::FileFormat::Toml,
            ));
        if let Some(path) = overlay_path {
            builder = builder.add_source(config::File::from(path.as_std_path()));
        }
        let config = builder
            .build()
            .map_err(|source| ConfigParseError::Read {
                path: overlay_path.unwrap_or(Utf8Path::new("<built-in>")).to_owned(),
                source,
            })?;
        let raw: RawTable = config
            .try_deserialize()
            .map_err(ConfigParseError::Deserialize)?;
        Ok(Self::from_entries(raw.profile))
    }

    fn from_entries(entries: Vec<ProfileEntry>) -> Self {
        let mut table = ProfileTable::default();
        for entry in entries {
            match entry.key {
                ProfileKeyRaw::RepoVersion { repo, version } => {
                    table.by_repo_version.insert((repo, version), entry.profile);
                }
                ProfileKeyRaw::Repo { repo } => {
                    table.by_repo.insert(repo, entry.profile);
                }
                ProfileKeyRaw::Language { language } => {
                    table.by_language.insert(language, entry.profile);
                }
            }
        }
        table
    }

    /// Looks up the best-matching profile for `repo`/`version`/`language`,
    /// in the order documented on [`ProfileTable`].
    pub fn resolve(&self, repo: &str, version: &str, language: Language) -> Option<&Profile> {
        self.by_repo_version
            .get(&(repo.to_string(), version.to_string()))
            .or_else(|| self.by_repo.get(repo))
            .or_else(|| self.by_language.get(&language))
    }
}

/// The id a log parser is registered under; re-exported here because
/// `Profile::log_parser_id` is a free-form string validated lazily against
/// the parser registry rather than at deserialization time.
pub fn parser_id(profile: &Profile) -> ParserId {
    ParserId(profile.log_parser_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_table_covers_every_language() {
        let table = ProfileTable::load(None).expect("built-in profiles parse");
        for language in Language::variants() {
            assert!(
                table.by_language.contains_key(language),
                "missing fallback profile for {language}"
            );
        }
    }

    #[test]
    fn repo_version_beats_repo_beats_language() {
        let table = ProfileTable::load(None).expect("built-in profiles parse");
        let specific = table
            .resolve("django/django", "4.2", Language::Python)
            .expect("django/django 4.2 has a dedicated profile");
        let fallback = table
            .resolve("some/unknown-repo", "0.0", Language::Python)
            .expect("falls back to the python language profile");
        assert_ne!(specific.base_image, fallback.base_image);
    }
}
