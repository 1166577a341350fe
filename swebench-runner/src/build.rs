// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Image Builder (SPEC_FULL.md §4.2): a three-level build DAG (base →
//! env → instance) with content-addressed caching and at-most-one
//! concurrent build per key, expressed as "promises over
//! threads-with-locks" (§9) rather than a hand-rolled semaphore loop.

use crate::engine::{BuildContext, ContainerEngine, ImageTag};
use crate::errors::BuildError;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use swebench_metadata::{CacheLevel, ImageKey, TestSpec};
use tokio::sync::Mutex;
use tracing::debug;

type BuildResult = Result<ImageTag, BuildError>;
type SharedBuild = Shared<BoxFuture<'static, BuildResult>>;

/// `key → promise<image|error>` (§4.2). The first caller for a key installs
/// the promise; every concurrent caller for the same key awaits the same
/// `Shared` future rather than triggering a second build.
pub struct BuildGraph {
    engine: Arc<dyn ContainerEngine>,
    namespace: Option<String>,
    promises: Mutex<HashMap<ImageKey, SharedBuild>>,
}

impl BuildGraph {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine, namespace: None, promises: Mutex::new(HashMap::new()) }
    }

    /// Prefixes every env/instance tag this graph builds with `namespace`
    /// (§6 "namespace, image-registry prefix, may be empty"), e.g.
    /// `myregistry.example.com/swebench-env:<key>`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = if namespace.is_empty() { None } else { Some(namespace) };
        self
    }

    fn tag(&self, repo: &str, key: &ImageKey) -> ImageTag {
        match &self.namespace {
            Some(ns) => ImageTag(format!("{ns}/{repo}:{key}")),
            None => ImageTag(format!("{repo}:{key}")),
        }
    }

    /// Ensures the base → env → instance chain for `spec` is built,
    /// returning the instance image tag ready for
    /// [`crate::engine::ContainerEngine::create_and_start`].
    pub async fn build_for_spec(&self, spec: &TestSpec) -> BuildResult {
        let base_tag = self.ensure_base(&spec.base_key, &spec.base_image).await?;
        let env_tag = self.ensure_env(&spec.env_key, base_tag, &spec.setup_script).await?;
        self.ensure_instance(&spec.instance_key, env_tag, &spec.install_script).await
    }

    pub async fn ensure_base(&self, key: &ImageKey, base_image: &str) -> BuildResult {
        self.ensure(key.clone(), ImageTag(base_image.to_string()), None, String::new(), "base")
            .await
    }

    pub async fn ensure_env(&self, key: &ImageKey, base_tag: ImageTag, setup_script: &str) -> BuildResult {
        self.ensure(
            key.clone(),
            self.tag("swebench-env", key),
            Some(base_tag),
            setup_script.to_string(),
            "env",
        )
        .await
    }

    pub async fn ensure_instance(
        &self,
        key: &ImageKey,
        env_tag: ImageTag,
        install_script: &str,
    ) -> BuildResult {
        self.ensure(
            key.clone(),
            self.tag("swebench-instance", key),
            Some(env_tag),
            install_script.to_string(),
            "instance",
        )
        .await
    }

    /// `absent → building → (ready | failed)` (§4.2). The `building` state
    /// is implicit: it is whatever `promises` holds a `Shared` future for
    /// that hasn't resolved yet; later lookups of the same key observe the
    /// same future and thus the same eventual outcome.
    async fn ensure(
        &self,
        key: ImageKey,
        tag: ImageTag,
        parent: Option<ImageTag>,
        script: String,
        level: &'static str,
    ) -> BuildResult {
        let mut guard = self.promises.lock().await;
        let shared = guard
            .entry(key.clone())
            .or_insert_with(|| {
                let engine = Arc::clone(&self.engine);
                let tag_for_future = tag.clone();
                let key_for_error = key.0.clone();
                let fut: BoxFuture<'static, BuildResult> = Box::pin(async move {
                    if let Some(parent) = &parent {
                        debug!(tag = %tag_for_future, parent = %parent, "building image layer");
                    } else {
                        debug!(tag = %tag_for_future, "pulling base image");
                    }
                    engine
                        .build_image(BuildContext {
                            tag: &tag_for_future,
                            parent: parent.as_ref(),
                            script: &script,
                        })
                        .await
                        .map(|()| tag_for_future.clone())
                        .map_err(|e| BuildError { level, key: key_for_error, log: e.0 })
                });
                fut.shared()
            })
            .clone();
        drop(guard);
        shared.await
    }

    /// Drops cached promises for `spec` according to `cache_level` once
    /// its dependent `RunRecord`s have terminated (§4.2 "Cleanup"). This
    /// only releases the builder's in-memory promise — actually removing
    /// the underlying image from the engine's store is outside the
    /// [`ContainerEngine`] contract, which names no removal capability.
    pub async fn evict(&self, spec: &TestSpec, cache_level: CacheLevel) {
        let mut guard = self.promises.lock().await;
        match cache_level {
            CacheLevel::None => {
                guard.remove(&spec.instance_key);
                guard.remove(&spec.env_key);
                guard.remove(&spec.base_key);
            }
            CacheLevel::Base => {
                guard.remove(&spec.instance_key);
                guard.remove(&spec.env_key);
            }
            CacheLevel::Env => {
                guard.remove(&spec.instance_key);
            }
            CacheLevel::Instance | CacheLevel::All => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ContainerId, EngineError, RunSpec, WaitOutcome};
    use async_trait::async_trait;
    use camino::Utf8Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingEngine {
        builds: AtomicUsize,
    }

    #[async_trait]
    impl ContainerEngine for CountingEngine {
        async fn build_image(&self, _ctx: BuildContext<'_>) -> Result<(), EngineError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        }
        async fn image_exists(&self, _tag: &ImageTag) -> Result<bool, EngineError> {
            Ok(true)
        }
        async fn create_and_start(&self, _spec: RunSpec<'_>) -> Result<ContainerId, EngineError> {
            unimplemented!()
        }
        async fn copy_in(
            &self,
            _container: &ContainerId,
            _path: &Utf8Path,
            _contents: &[u8],
        ) -> Result<(), EngineError> {
            unimplemented!()
        }
        async fn exec(
            &self,
            _container: &ContainerId,
            _command: &str,
            _timeout: Duration,
        ) -> Result<(WaitOutcome, Vec<u8>), EngineError> {
            unimplemented!()
        }
        async fn copy_out(
            &self,
            _container: &ContainerId,
            _path: &Utf8Path,
        ) -> Result<Option<Vec<u8>>, EngineError> {
            unimplemented!()
        }
        async fn stop_and_remove(&self, _container: &ContainerId, _grace: Duration) -> Result<(), EngineError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn concurrent_ensure_for_same_key_builds_once() {
        let engine = Arc::new(CountingEngine { builds: AtomicUsize::new(0) });
        let graph = BuildGraph::new(engine.clone());
        let key = ImageKey("shared-env".to_string());

        let (a, b) = tokio::join!(
            graph.ensure_env(&key, ImageTag("base".to_string()), "pip install -e ."),
            graph.ensure_env(&key, ImageTag("base".to_string()), "pip install -e ."),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(engine.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_build_independently() {
        let engine = Arc::new(CountingEngine { builds: AtomicUsize::new(0) });
        let graph = BuildGraph::new(engine.clone());

        let a = graph.ensure_env(&ImageKey("a".to_string()), ImageTag("base".to_string()), "x").await;
        let b = graph.ensure_env(&ImageKey("b".to_string()), ImageTag("base".to_string()), "y").await;
        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(engine.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn evict_none_drops_every_level() {
        let engine = Arc::new(CountingEngine { builds: AtomicUsize::new(0) });
        let graph = BuildGraph::new(engine);
        let spec_base = ImageKey("b".to_string());
        let spec_env = ImageKey("e".to_string());
        let spec_instance = ImageKey("i".to_string());
        graph.ensure_base(&spec_base, "ubuntu:22.04").await.unwrap();
        let env = graph.ensure_env(&spec_env, ImageTag("ubuntu:22.04".to_string()), "").await.unwrap();
        graph.ensure_instance(&spec_instance, env, "").await.unwrap();

        let fake = fake_spec(spec_base, spec_env, spec_instance);
        graph.evict(&fake, CacheLevel::None).await;
        let guard = graph.promises.lock().await;
        assert!(guard.is_empty());
    }

    fn fake_spec(base_key: ImageKey, env_key: ImageKey, instance_key: ImageKey) -> TestSpec {
        use std::collections::BTreeSet;
        use swebench_metadata::{ParserId, SchemaVersion};
        TestSpec {
            schema_version: SchemaVersion::CURRENT,
            instance_id: "pkg__pkg-1".to_string(),
            base_image: "ubuntu:22.04".to_string(),
            base_key,
            env_key,
            instance_key,
            setup_script: String::new(),
            install_script: String::new(),
            eval_script_template: String::new(),
            test_command: String::new(),
            timeout: Duration::from_secs(1),
            log_parser_id: ParserId("pytest".to_string()),
            fail_to_pass: BTreeSet::new(),
            pass_to_pass: BTreeSet::new(),
        }
    }
}
