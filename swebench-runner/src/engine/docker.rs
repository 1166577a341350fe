// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`ContainerEngine`] backed by a local Docker daemon via `bollard`.
//!
//! Image layers are built the way a human would at a shell: start a
//! container `FROM` the parent tag, run the layer's script inside it with
//! `exec`, then `commit` the container as the new tag. There is no
//! Dockerfile on disk; [`BuildContext::script`] plays that role. Files are
//! moved in and out of a running container by piping through `exec` rather
//! than building a tar archive, since nothing else in this workspace needs
//! a tar writer.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::container::CommitContainerOptions;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, LogConfig};
use bollard::Docker;
use camino::Utf8Path;
use futures::{AsyncWriteExt as FuturesAsyncWriteExt, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    BuildContext, ContainerEngine, ContainerId, EngineError, ImageTag, RunSpec, WaitOutcome,
};

/// Sentinel command that keeps a container alive between `exec` calls.
/// The harness never relies on the image's own entrypoint: every image,
/// base or derived, is started the same way and driven entirely by
/// [`ContainerEngine::exec`].
const KEEPALIVE_CMD: [&str; 3] = ["/bin/sh", "-c", "sleep infinity"];

pub struct DockerEngine {
    client: Docker,
    memory_limit_bytes: i64,
    nano_cpus: i64,
}

impl DockerEngine {
    /// Connects using the same environment/socket conventions as the
    /// `docker` CLI (`DOCKER_HOST`, `~/.docker/config.json`, etc).
    pub fn connect() -> Result<Self, EngineError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError(format!("failed to connect to Docker daemon: {e}")))?;
        Ok(Self {
            client,
            memory_limit_bytes: 4 * 1024 * 1024 * 1024,
            nano_cpus: 2_000_000_000,
        })
    }

    pub fn with_resource_limits(mut self, memory_limit_bytes: i64, nano_cpus: i64) -> Self {
        self.memory_limit_bytes = memory_limit_bytes;
        self.nano_cpus = nano_cpus;
        self
    }

    async fn pull_if_missing(&self, image: &str) -> Result<(), EngineError> {
        if self.client.inspect_image(image).await.is_ok() {
            return Ok(());
        }
        debug!(%image, "image not cached locally, pulling");
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.client.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(%status, "pull progress");
                    }
                }
                Err(e) => return Err(EngineError(format!("failed to pull `{image}`: {e}"))),
            }
        }
        Ok(())
    }

    fn host_config(&self, network_enabled: bool) -> HostConfig {
        HostConfig {
            memory: Some(self.memory_limit_bytes),
            memory_swap: Some(self.memory_limit_bytes),
            nano_cpus: Some(self.nano_cpus),
            network_mode: Some(if network_enabled {
                "bridge".to_string()
            } else {
                "none".to_string()
            }),
            log_config: Some(LogConfig {
                typ: Some("json-file".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Runs `command` to completion inside `container`, capturing combined
    /// stdout+stderr and the exit code. Shared by [`exec`](Self::exec),
    /// [`copy_in`](Self::copy_in), and [`copy_out`](Self::copy_out), which
    /// differ only in the shell command and what they do with the result.
    async fn run_to_completion(
        &self,
        container: &str,
        command: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<(i64, Vec<u8>), EngineError> {
        let exec = self
            .client
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(command),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    attach_stdin: Some(stdin.is_some()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| EngineError(format!("failed to create exec: {e}")))?;

        let start = self
            .client
            .start_exec(&exec.id, Some(StartExecOptions { detach: false, ..Default::default() }))
            .await
            .map_err(|e| EngineError(format!("failed to start exec: {e}")))?;

        let mut captured = Vec::new();
        match start {
            StartExecResults::Attached { mut output, mut input } => {
                if let Some(bytes) = stdin {
                    input
                        .write_all(&bytes)
                        .await
                        .map_err(|e| EngineError(format!("failed to write exec stdin: {e}")))?;
                }
                drop(input);
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(bollard::container::LogOutput::StdOut { message })
                        | Ok(bollard::container::LogOutput::StdErr { message })
                        | Ok(bollard::container::LogOutput::Console { message }) => {
                            captured.extend_from_slice(&message);
                        }
                        Ok(_) => {}
                        Err(e) => return Err(EngineError(format!("exec stream error: {e}"))),
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(EngineError("exec unexpectedly ran detached".to_string()));
            }
        }

        let inspect = self
            .client
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| EngineError(format!("failed to inspect exec: {e}")))?;
        let exit_code = inspect.exit_code.unwrap_or(-1);
        Ok((exit_code, captured))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build_image(&self, ctx: BuildContext<'_>) -> Result<(), EngineError> {
        let Some(parent) = ctx.parent else {
            // A base layer: it names an image that already exists upstream.
            return self.pull_if_missing(&ctx.tag.0).await;
        };
        self.pull_if_missing(&parent.0).await?;

        let container_name = format!("swebench-build-{}", ctx.tag.0.replace([':', '/'], "-"));
        let config = Config {
            image: Some(parent.0.clone()),
            cmd: Some(KEEPALIVE_CMD.iter().map(|s| s.to_string()).collect()),
            host_config: Some(self.host_config(true)),
            ..Default::default()
        };
        let container = self
            .client
            .create_container(
                Some(CreateContainerOptions { name: container_name.as_str(), platform: None }),
                config,
            )
            .await
            .map_err(|e| EngineError(format!("failed to create build container: {e}")))?;

        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError(format!("failed to start build container: {e}")))?;

        let build_result = async {
            let (exit_code, log) = self
                .run_to_completion(
                    &container.id,
                    vec!["/bin/sh".to_string(), "-c".to_string(), ctx.script.to_string()],
                    None,
                )
                .await?;
            if exit_code != 0 {
                return Err(EngineError(format!(
                    "build script exited {exit_code} while building `{}`: {}",
                    ctx.tag,
                    String::from_utf8_lossy(&log)
                )));
            }

            self.client
                .commit_container(
                    CommitContainerOptions {
                        container: container.id.clone(),
                        repo: ctx.tag.0.clone(),
                        pause: true,
                        ..Default::default()
                    },
                    Config::<String>::default(),
                )
                .await
                .map_err(|e| EngineError(format!("failed to commit `{}`: {e}", ctx.tag)))?;
            Ok(())
        }
        .await;

        let remove_options = Some(RemoveContainerOptions { force: true, v: true, ..Default::default() });
        if let Err(e) = self.client.remove_container(&container.id, remove_options).await {
            warn!(container = %container.id, error = %e, "failed to remove build container");
        }

        build_result
    }

    async fn image_exists(&self, tag: &ImageTag) -> Result<bool, EngineError> {
        Ok(self.client.inspect_image(&tag.0).await.is_ok())
    }

    async fn create_and_start(&self, spec: RunSpec<'_>) -> Result<ContainerId, EngineError> {
        self.pull_if_missing(&spec.image.0).await?;

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let config = Config {
            image: Some(spec.image.0.clone()),
            cmd: Some(KEEPALIVE_CMD.iter().map(|s| s.to_string()).collect()),
            working_dir: Some(spec.workdir.to_string()),
            env: Some(env),
            host_config: Some(self.host_config(spec.network_enabled)),
            ..Default::default()
        };

        let container = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| EngineError(format!("failed to create container: {e}")))?;

        self.client
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| EngineError(format!("failed to start container: {e}")))?;

        Ok(ContainerId(container.id))
    }

    async fn copy_in(
        &self,
        container: &ContainerId,
        path: &Utf8Path,
        contents: &[u8],
    ) -> Result<(), EngineError> {
        let (exit_code, log) = self
            .run_to_completion(
                &container.0,
                vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    format!("mkdir -p \"$(dirname '{path}')\" && cat > '{path}'"),
                ],
                Some(contents.to_vec()),
            )
            .await?;
        if exit_code != 0 {
            return Err(EngineError(format!(
                "failed to write `{path}` into {}: {}",
                container.0,
                String::from_utf8_lossy(&log)
            )));
        }
        Ok(())
    }

    async fn exec(
        &self,
        container: &ContainerId,
        command: &str,
        timeout: Duration,
    ) -> Result<(WaitOutcome, Vec<u8>), EngineError> {
        let run = self.run_to_completion(
            &container.0,
            vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()],
            None,
        );
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok((exit_code, output))) => Ok((WaitOutcome::Exited(exit_code as i32), output)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok((WaitOutcome::TimedOut, Vec::new())),
        }
    }

    async fn copy_out(
        &self,
        container: &ContainerId,
        path: &Utf8Path,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        let (exit_code, output) = self
            .run_to_completion(
                &container.0,
                vec!["/bin/sh".to_string(), "-c".to_string(), format!("cat '{path}'")],
                None,
            )
            .await?;
        if exit_code != 0 {
            return Ok(None);
        }
        Ok(Some(output))
    }

    async fn stop_and_remove(&self, container: &ContainerId, grace: Duration) -> Result<(), EngineError> {
        let stop_options = Some(StopContainerOptions { t: grace.as_secs() as i64 });
        if let Err(e) = self.client.stop_container(&container.0, stop_options).await {
            let msg = e.to_string();
            if !msg.contains("404") && !msg.contains("not found") {
                warn!(container = %container.0, error = %msg, "stop_container failed, removing anyway");
            }
        }

        let remove_options = Some(RemoveContainerOptions { force: true, v: true, ..Default::default() });
        match self.client.remove_container(&container.0, remove_options).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("404") || msg.contains("not found") {
                    Ok(())
                } else {
                    Err(EngineError(format!("failed to remove {}: {msg}", container.0)))
                }
            }
        }
    }
}
