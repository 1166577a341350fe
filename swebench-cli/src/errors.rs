// SPDX-License-Identifier: MIT OR Apache-2.0

//! The CLI's own failure domain, mapped onto the two non-zero exit codes
//! named in SPEC_FULL.md §6: invalid input (2) and everything else that
//! prevents the run from completing at all (1). Per-instance failures
//! never appear here — those are graded into `verdict.json` by the
//! Scheduler and do not stop the run.

use camino::Utf8PathBuf;
use swebench_metadata::HarnessExitCode;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read dataset file `{path}`")]
    ReadDataset {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse dataset file `{path}` as a JSON array of instances")]
    ParseDataset {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read predictions file `{path}`")]
    ReadPredictions {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse predictions file `{path}` as a JSON object of instance_id -> patch")]
    ParsePredictions {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no instance in the dataset matched the requested --instance-id filter")]
    EmptyInstanceSelection,
    #[error("--collect-output is required when --collect is set")]
    MissingCollectOutput,
    #[error("failed to read existing collect-output dataset `{path}`")]
    ReadCollectOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse existing collect-output dataset `{path}` as a JSON array of instances")]
    ParseCollectOutput {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write collect-output dataset `{path}`")]
    WriteCollectOutput {
        path: Utf8PathBuf,
        #[source]
        source: swebench_runner::errors::RecordError,
    },
    #[error("failed to load the profile table")]
    Profiles(#[from] swebench_runner::errors::ConfigParseError),
    #[error("failed to write summary.json for run `{run_id}`")]
    Summary {
        run_id: String,
        #[source]
        source: swebench_runner::errors::RecordError,
    },
    #[error("failed to start the async runtime")]
    Runtime {
        #[source]
        source: std::io::Error,
    },
    #[error("could not reach the container engine")]
    Engine {
        #[source]
        source: swebench_runner::engine::EngineError,
    },
}

impl CliError {
    /// The exit code this error should cause the process to return.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ReadDataset { .. }
            | CliError::ParseDataset { .. }
            | CliError::ReadPredictions { .. }
            | CliError::ParsePredictions { .. }
            | CliError::EmptyInstanceSelection
            | CliError::MissingCollectOutput => HarnessExitCode::INVALID_INPUT,
            CliError::ReadCollectOutput { .. }
            | CliError::ParseCollectOutput { .. }
            | CliError::WriteCollectOutput { .. }
            | CliError::Profiles(_)
            | CliError::Summary { .. }
            | CliError::Runtime { .. }
            | CliError::Engine { .. } => HarnessExitCode::INTERNAL_ERROR,
        }
    }
}
