// SPDX-License-Identifier: MIT OR Apache-2.0

//! The container engine seam (SPEC_FULL.md §4.3, §6): the "OCI-style
//! image/container API" the core assumes is available. [`ContainerEngine`]
//! is the trait a real engine (Docker, via [`docker`]) or a test double
//! (see `crate::testing`) implements; nothing above this module knows or
//! cares which.

use async_trait::async_trait;
use camino::Utf8Path;
use std::collections::BTreeMap;
use std::time::Duration;

pub mod docker;

/// An image tag as understood by the engine (e.g. `swebench/base:<hex>`).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ImageTag(pub String);

impl std::fmt::Display for ImageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque container handle as understood by the engine.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContainerId(pub String);

/// The build context for one image layer: a dockerfile-equivalent script
/// body plus the parent image it builds from (`None` for a base layer
/// that only needs to be pulled).
pub struct BuildContext<'a> {
    pub tag: &'a ImageTag,
    pub parent: Option<&'a ImageTag>,
    pub script: &'a str,
}

/// The request to create and start a container for one evaluation run.
pub struct RunSpec<'a> {
    pub image: &'a ImageTag,
    pub env: &'a BTreeMap<String, String>,
    pub workdir: &'a Utf8Path,
    /// Disabled unless the profile explicitly opts in (§4.3 step 1).
    pub network_enabled: bool,
}

/// The terminal outcome of waiting on a container, distinguishing a clean
/// exit from a timeout (SPEC_FULL.md §4.3 step 5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitOutcome {
    Exited(i32),
    TimedOut,
}

/// The minimal container-engine capability set the harness core requires
/// (SPEC_FULL.md §6): build, run, exec, copy in/out, stop/remove, inspect.
/// No other capability is assumed; a real engine may offer much more.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds (or confirms cached) the image named by `ctx.tag`. Building
    /// the same tag concurrently from two callers is the Builder's
    /// responsibility to prevent, not the engine's.
    async fn build_image(&self, ctx: BuildContext<'_>) -> Result<(), EngineError>;

    /// True if an image with this tag already exists in the engine's
    /// local store.
    async fn image_exists(&self, tag: &ImageTag) -> Result<bool, EngineError>;

    /// Creates and starts a container from `spec`. No command runs yet;
    /// the container is expected to stay alive (e.g. `sleep infinity`)
    /// until [`exec`](ContainerEngine::exec) calls and
    /// [`stop_and_remove`](ContainerEngine::stop_and_remove) drive it.
    async fn create_and_start(&self, spec: RunSpec<'_>) -> Result<ContainerId, EngineError>;

    /// Writes `contents` to `path` inside the container.
    async fn copy_in(
        &self,
        container: &ContainerId,
        path: &Utf8Path,
        contents: &[u8],
    ) -> Result<(), EngineError>;

    /// Runs `command` inside the container via `/bin/sh -c`, waiting up to
    /// `timeout` and streaming combined stdout+stderr back.
    async fn exec(
        &self,
        container: &ContainerId,
        command: &str,
        timeout: Duration,
    ) -> Result<(WaitOutcome, Vec<u8>), EngineError>;

    /// Reads the file at `path` inside the container, if it exists.
    async fn copy_out(
        &self,
        container: &ContainerId,
        path: &Utf8Path,
    ) -> Result<Option<Vec<u8>>, EngineError>;

    /// Stops (graceful, then forceful after `grace`) and removes the
    /// container. Idempotent: called from every exit path, including
    /// error paths, so it must not fail merely because the container is
    /// already gone.
    async fn stop_and_remove(
        &self,
        container: &ContainerId,
        grace: Duration,
    ) -> Result<(), EngineError>;
}

/// The engine is unavailable, unhealthy, or returned a response the
/// harness could not interpret. Distinct from [`crate::errors::EngineError`]
/// only in that this one carries the original `bollard`/transport error;
/// call sites convert it at the point they decide per-instance vs.
/// whole-run severity.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl From<EngineError> for crate::errors::EngineError {
    fn from(e: EngineError) -> Self {
        crate::errors::EngineError(e.0)
    }
}
