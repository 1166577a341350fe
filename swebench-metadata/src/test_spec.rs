// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::ids::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// The three image fingerprints that key the layered build graph (§4.2).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ImageKey(pub String);

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies which [log parser](crate) a [`TestSpec`] should be routed
/// through.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ParserId(pub String);

/// The fully resolved recipe derived from an [`Instance`](crate::Instance)
/// by the Specification Resolver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestSpec {
    pub schema_version: SchemaVersion,

    pub instance_id: String,

    /// The base image recipe's identifier (e.g. a registry tag), carried
    /// alongside `base_key` since the fingerprint alone isn't enough for
    /// the Builder to pull it (§4.2: "base image recipe").
    pub base_image: String,
    pub base_key: ImageKey,
    pub env_key: ImageKey,
    pub instance_key: ImageKey,

    /// Text executed inside the env layer to install language/runtime
    /// and project dependencies.
    pub setup_script: String,

    /// Text executed inside the instance layer to check out the
    /// repository at `base_commit` and install it.
    pub install_script: String,

    /// Text executed at run time, rendered with the patch content as
    /// input; contains the test command.
    pub eval_script_template: String,

    /// The raw test command, kept alongside the rendered eval script for
    /// display and logging purposes.
    pub test_command: String,

    pub timeout: Duration,

    pub log_parser_id: ParserId,

    /// Tests expected to transition from failing to passing.
    pub fail_to_pass: BTreeSet<String>,

    /// Tests expected to remain passing.
    pub pass_to_pass: BTreeSet<String>,
}

/// Image cache eviction policy (§4.2, §6).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheLevel {
    /// Evict every image after use.
    None,
    /// Keep only base images.
    Base,
    /// Keep base and env images.
    Env,
    /// Keep base, env, and instance images.
    #[default]
    Instance,
    /// Never evict.
    All,
}

impl CacheLevel {
    pub fn variants() -> &'static [&'static str] {
        &["none", "base", "env", "instance", "all"]
    }
}

impl std::str::FromStr for CacheLevel {
    type Err = CacheLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CacheLevel::None),
            "base" => Ok(CacheLevel::Base),
            "env" => Ok(CacheLevel::Env),
            "instance" => Ok(CacheLevel::Instance),
            "all" => Ok(CacheLevel::All),
            _ => Err(CacheLevelParseError {
                input: s.to_string(),
            }),
        }
    }
}

/// Error returned while parsing a [`CacheLevel`] from a string.
#[derive(Clone, Debug, thiserror::Error)]
#[error(
    "unrecognized value for cache-level: {input}\n(known values: {})",
    CacheLevel::variants().join(", "),
)]
pub struct CacheLevelParseError {
    input: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_level_round_trips_through_str() {
        for v in CacheLevel::variants() {
            let parsed: CacheLevel = v.parse().unwrap();
            assert_eq!(parsed, parsed);
        }
    }

    #[test]
    fn cache_level_rejects_unknown_values() {
        assert!("bogus".parse::<CacheLevel>().is_err());
    }
}
