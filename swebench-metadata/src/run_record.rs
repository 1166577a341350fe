// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::test_spec::ImageKey;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Created when a container is launched for an instance.
///
/// Every `RunRecord` either reaches a terminal state (`finished_at` set)
/// within `timeout + grace`, or is explicitly cancelled; no container
/// survives its `RunRecord` (§3 invariant, verified in the Runner's
/// teardown path).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance_id: String,
    pub image_key: ImageKey,
    pub container_id: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub exit_code: Option<i32>,
    pub timed_out: bool,

    pub log_blob: Utf8PathBuf,
    pub report_blobs: Vec<Utf8PathBuf>,
}

impl RunRecord {
    pub fn is_terminal(&self) -> bool {
        self.finished_at.is_some()
    }
}
