// SPDX-License-Identifier: MIT OR Apache-2.0

//! Renders [`SchedulerEvent`]s to a terminal progress bar. Consuming the
//! channel on a dedicated task keeps event emission off the worker's hot
//! path, per the Scheduler's own "emission never blocks a worker"
//! contract.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use swebench_metadata::Resolution;
use swebench_runner::SchedulerEvent;
use tokio::sync::mpsc::UnboundedReceiver;

pub async fn drive(mut events: UnboundedReceiver<SchedulerEvent>, total: usize) {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::InstanceStarted { instance_id } => {
                bar.set_message(instance_id);
            }
            SchedulerEvent::ImageReady { .. } | SchedulerEvent::RunFinished { .. } => {}
            SchedulerEvent::InstanceSkipped { instance_id } => {
                bar.println(format!("{} {instance_id} (resumed)", "skip".dimmed()));
                bar.inc(1);
            }
            SchedulerEvent::VerdictReady { instance_id, resolved } => {
                let label = match resolved {
                    Resolution::Resolved => "resolved".green().to_string(),
                    Resolution::PartiallyResolved => "partial".yellow().to_string(),
                    Resolution::Unresolved => "unresolved".red().to_string(),
                    _ if resolved.is_undefined() => "error".red().bold().to_string(),
                    _ => "unresolved".red().to_string(),
                };
                bar.println(format!("{label} {instance_id}"));
                bar.inc(1);
            }
        }
    }
    bar.finish_and_clear();
}
