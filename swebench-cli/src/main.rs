// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::sync::Arc;
use swebench_cli::cli::SwebenchCli;
use swebench_cli::errors::CliError;
use swebench_cli::{input, progress};
use swebench_metadata::{HarnessExitCode, Instance};
use swebench_runner::engine::docker::DockerEngine;
use swebench_runner::engine::ContainerEngine;
use swebench_runner::{ProfileTable, Scheduler, SchedulerOptions};
use tracing::warn;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = SwebenchCli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            let mut source = std::error::Error::source(&error);
            while let Some(s) = source {
                eprintln!("  {} {s}", "caused by:".dimmed());
                source = s.source();
            }
            std::process::exit(error.exit_code())
        }
    }
}

fn run(cli: SwebenchCli) -> Result<i32, CliError> {
    let instances = input::load_instances(&cli.dataset, &cli.predictions, &cli.instance_ids)?;
    let profiles = Arc::new(ProfileTable::load(cli.profiles.as_deref())?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| CliError::Runtime { source })?;

    runtime.block_on(async_main(cli, instances, profiles))
}

async fn async_main(
    cli: SwebenchCli,
    instances: Vec<swebench_metadata::Instance>,
    profiles: Arc<ProfileTable>,
) -> Result<i32, CliError> {
    let engine: Arc<dyn ContainerEngine> =
        Arc::new(DockerEngine::connect().map_err(|source| CliError::Engine { source })?);

    if cli.collect {
        return run_collect(&cli, instances, profiles, engine).await;
    }

    let total = instances.len();
    let options = SchedulerOptions {
        max_workers: cli.max_workers,
        run_id: cli.run_id.clone(),
        results_root: cli.results_root.clone(),
        force_rebuild: cli.force_rebuild,
        cache_level: cli.cache_level.into(),
        namespace: cli.namespace.clone(),
        timeout_override: cli.timeout(),
    };
    let scheduler = Scheduler::new(engine, profiles, options);
    let (fut, rx, _cancel) = scheduler.run(instances);

    let progress = tokio::spawn(progress::drive(rx, total));
    let summary = fut.await;
    let _ = progress.await;

    println!(
        "{}/{} resolved, {} partial, {} unresolved, {} errored",
        summary.resolved, summary.total, summary.partially_resolved, summary.unresolved, summary.errored
    );

    let root = swebench_runner::record::RunRoot::new(cli.results_root.clone(), &cli.run_id);
    summary
        .write(&root)
        .map_err(|source| CliError::Summary { run_id: cli.run_id.clone(), source })?;

    Ok(HarnessExitCode::OK)
}

/// `--collect`: resolves and builds each instance's image, runs the
/// two-pass Test Collector instead of the normal grading pipeline, and
/// incrementally, atomically rewrites `--collect-output` with the derived
/// `FAIL_TO_PASS`/`PASS_TO_PASS` sets (SPEC_FULL.md §4.5 step 4) — every
/// instance completed so far is committed to disk before the next one
/// starts, so an interruption loses at most the in-flight instance.
///
/// On restart against the same `--collect-output` path, instances that
/// already carry non-empty expected sets there are skipped unless
/// `--force-rebuild` is set.
async fn run_collect(
    cli: &SwebenchCli,
    mut instances: Vec<Instance>,
    profiles: Arc<ProfileTable>,
    engine: Arc<dyn ContainerEngine>,
) -> Result<i32, CliError> {
    let output_path = cli.collect_output.as_ref().ok_or(CliError::MissingCollectOutput)?;

    if output_path.is_file() {
        let text = fs_err::read_to_string(output_path)
            .map_err(|source| CliError::ReadCollectOutput { path: output_path.clone(), source })?;
        let previous: Vec<Instance> = serde_json::from_str(&text)
            .map_err(|source| CliError::ParseCollectOutput { path: output_path.clone(), source })?;
        let by_id: HashMap<String, Instance> =
            previous.into_iter().map(|instance| (instance.instance_id.clone(), instance)).collect();
        for instance in &mut instances {
            if let Some(previous) = by_id.get(&instance.instance_id) {
                if !previous.needs_collection() {
                    instance.fail_to_pass = previous.fail_to_pass.clone();
                    instance.pass_to_pass = previous.pass_to_pass.clone();
                }
            }
        }
    }

    let builder = Arc::new(
        swebench_runner::BuildGraph::new(Arc::clone(&engine)).with_namespace(cli.namespace.clone()),
    );

    for index in 0..instances.len() {
        if !cli.force_rebuild && !instances[index].needs_collection() {
            eprintln!(
                "{} {}: already labeled in `{output_path}`, skipping",
                "skip:".yellow(),
                instances[index].instance_id
            );
            continue;
        }
        let instance = instances[index].clone();

        let spec = match swebench_runner::resolver::resolve(&instance, &profiles) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{} {}: {e}", "skip:".yellow(), instance.instance_id);
                continue;
            }
        };
        let instance_image = match builder.build_for_spec(&spec).await {
            Ok(tag) => tag,
            Err(e) => {
                eprintln!("{} {}: {e}", "build failed:".red(), instance.instance_id);
                continue;
            }
        };
        match swebench_runner::collector::collect_labels(&engine, &spec, &instance, &instance_image).await {
            Ok(labels) => {
                if !labels.regressed.is_empty() {
                    eprintln!(
                        "{} {}: {} test(s) regressed between passes",
                        "warn:".yellow(),
                        instance.instance_id,
                        labels.regressed.len()
                    );
                }
                instances[index].fail_to_pass = labels.fail_to_pass;
                instances[index].pass_to_pass = labels.pass_to_pass;
                if let Err(e) = swebench_runner::record::write_instances_atomic(output_path, &instances) {
                    warn!(error = %e, path = %output_path, "failed to persist collect-output dataset");
                }
            }
            Err(e) => eprintln!("{} {}: {e}", "collect failed:".red(), instance.instance_id),
        }
    }

    println!(
        "{}/{} instances collected, output written to `{output_path}`",
        instances.iter().filter(|i| !i.needs_collection()).count(),
        instances.len()
    );
    Ok(HarnessExitCode::OK)
}
