// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-process [`ContainerEngine`] test double, so the Scheduler,
//! Runner, and Builder can be exercised deterministically (SPEC_FULL.md
//! §8 S1-S6) without a real container engine. Exposed under the
//! `test-util` feature for `swebench-cli`'s integration tests and is
//! always available under `#[cfg(test)]` within this crate.

use crate::engine::{BuildContext, ContainerEngine, ContainerId, EngineError, ImageTag, RunSpec, WaitOutcome};
use async_trait::async_trait;
use camino::Utf8Path;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What [`FakeEngine::exec`] should simulate for the eval script call.
#[derive(Clone, Debug)]
pub enum FakeBehavior {
    /// The eval script completes with exit code 0 and `log`.
    Succeed { log: String },
    /// The eval script completes with exit code 0 but `log` (e.g. for a
    /// scenario where some tests fail without the patch regressing).
    SucceedWithLog(String),
    /// `git apply` rejects the patch (§4.3 step 3): exit code 97 and the
    /// `SWEBENCH_PATCH_REJECTED` sentinel in the log.
    PatchRejected,
    /// The eval script runs past its timeout.
    TimedOut,
    /// `copy_in` fails, simulating the container being unreachable after
    /// creation.
    FailCopyIn,
}

/// Records every container [`FakeEngine::create_and_start`] created that
/// has not yet been torn down by [`FakeEngine::stop_and_remove`], so tests
/// can assert the "no container survives its RunRecord" invariant (§3).
pub struct FakeEngine {
    behavior: FakeBehavior,
    live_containers: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    pub build_count: AtomicUsize,
}

impl FakeEngine {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            live_containers: Mutex::new(HashSet::new()),
            next_id: AtomicUsize::new(0),
            build_count: AtomicUsize::new(0),
        }
    }

    pub fn live_container_count(&self) -> usize {
        self.live_containers.lock().unwrap().len()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build_image(&self, _ctx: BuildContext<'_>) -> Result<(), EngineError> {
        self.build_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn image_exists(&self, _tag: &ImageTag) -> Result<bool, EngineError> {
        Ok(true)
    }

    async fn create_and_start(&self, _spec: RunSpec<'_>) -> Result<ContainerId, EngineError> {
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live_containers.lock().unwrap().insert(id.clone());
        Ok(ContainerId(id))
    }

    async fn copy_in(
        &self,
        _container: &ContainerId,
        _path: &Utf8Path,
        _contents: &[u8],
    ) -> Result<(), EngineError> {
        match &self.behavior {
            FakeBehavior::FailCopyIn => Err(EngineError("simulated copy_in failure".to_string())),
            _ => Ok(()),
        }
    }

    async fn exec(
        &self,
        _container: &ContainerId,
        _command: &str,
        _timeout: Duration,
    ) -> Result<(WaitOutcome, Vec<u8>), EngineError> {
        match &self.behavior {
            FakeBehavior::Succeed { log } | FakeBehavior::SucceedWithLog(log) => {
                Ok((WaitOutcome::Exited(0), log.clone().into_bytes()))
            }
            FakeBehavior::PatchRejected => {
                Ok((WaitOutcome::Exited(97), b"SWEBENCH_PATCH_REJECTED\n".to_vec()))
            }
            FakeBehavior::TimedOut => Ok((WaitOutcome::TimedOut, Vec::new())),
            FakeBehavior::FailCopyIn => Ok((WaitOutcome::Exited(0), Vec::new())),
        }
    }

    async fn copy_out(
        &self,
        _container: &ContainerId,
        _path: &Utf8Path,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(None)
    }

    async fn stop_and_remove(&self, container: &ContainerId, _grace: Duration) -> Result<(), EngineError> {
        self.live_containers.lock().unwrap().remove(&container.0);
        Ok(())
    }
}
