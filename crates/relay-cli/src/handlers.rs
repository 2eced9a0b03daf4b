//! Command handlers.

use crate::config::{OutputFormat, load_scheduler_config};
use anyhow::Context;
use console::style;
use relay_core::ids::{DistroId, TaskId};
use relay_core::task::Task;
use relay_scheduler::memory::{RecordingDispatcher, Snapshot};
use relay_scheduler::{CancelSignal, DispatchPass, PassOutcome, RuleRegistry};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Per-distro result printed by `relay rank --format json`.
#[derive(Debug, Serialize)]
struct DistroReport {
    distro: DistroId,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass_id: Option<String>,
    task_ids: Vec<TaskId>,
    anomalies: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl DistroReport {
    fn new(distro: DistroId, outcome: &PassOutcome) -> Self {
        let (status, anomalies, reason) = match outcome {
            PassOutcome::Ranked { anomalies, .. } => ("ranked", *anomalies, None),
            PassOutcome::RetainedPrevious { reason, .. } => ("retained", 0, Some(reason.clone())),
            PassOutcome::Cancelled { stage } => ("cancelled", 0, Some(format!("cancelled {stage}"))),
        };
        let order = outcome.effective_order();

        Self {
            distro,
            status,
            pass_id: order.map(|o| o.pass_id.to_string()),
            task_ids: order.map(|o| o.task_ids.clone()).unwrap_or_default(),
            anomalies,
            reason,
        }
    }
}

/// Rank a snapshot file.
pub async fn rank(
    snapshot_path: &Path,
    distro: Option<String>,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_scheduler_config(config_path)?;
    let snapshot = Snapshot::from_file(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    let distros: Vec<DistroId> = match distro {
        Some(distro) => vec![DistroId::from(distro)],
        None => snapshot
            .tasks
            .iter()
            .map(|t| t.distro.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };
    let tasks: HashMap<TaskId, Task> = snapshot
        .tasks
        .iter()
        .map(|t| (t.id.clone(), t.clone()))
        .collect();

    info!(
        snapshot = %snapshot_path.display(),
        tasks = tasks.len(),
        distros = distros.len(),
        "Loaded snapshot"
    );

    let (store, configs) = snapshot.into_adapters();
    let pass = DispatchPass::new(
        Arc::new(store),
        Arc::new(configs),
        Arc::new(RecordingDispatcher::new()),
        config,
    )?;

    let outcomes = pass.run_all(&distros, &CancelSignal::new()).await;

    match format {
        OutputFormat::Json => {
            let reports: Vec<DistroReport> = outcomes
                .iter()
                .map(|(distro, outcome)| DistroReport::new(distro.clone(), outcome))
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Table => {
            for (distro, outcome) in &outcomes {
                print_table(distro, outcome, &tasks);
            }
        }
    }

    Ok(())
}

fn print_table(distro: &DistroId, outcome: &PassOutcome, tasks: &HashMap<TaskId, Task>) {
    match outcome {
        PassOutcome::Ranked { order, anomalies } => {
            println!(
                "{} {} ({} tasks, {} anomalies)",
                style("✓").green(),
                style(distro).bold(),
                order.len(),
                anomalies
            );
        }
        PassOutcome::RetainedPrevious { reason, .. } => {
            println!("{} {} {}", style("!").yellow(), style(distro).bold(), reason);
        }
        PassOutcome::Cancelled { stage } => {
            println!("{} {} cancelled {}", style("✗").red(), style(distro).bold(), stage);
        }
    }

    let Some(order) = outcome.effective_order() else {
        return;
    };
    if order.is_empty() {
        println!("  {}", style("No queued tasks").dim());
        return;
    }

    println!(
        "  {:>4}  {:<28} {:>8} {:>10}  {:<12} {:<16}",
        "#", "TASK", "PRIORITY", "DEPENDENTS", "BUILD", "GROUP"
    );
    for (position, id) in order.task_ids.iter().enumerate() {
        match tasks.get(id) {
            Some(task) => println!(
                "  {:>4}  {:<28} {:>8} {:>10}  {:<12} {:<16}",
                position + 1,
                task.display_name,
                task.priority,
                task.num_dependents,
                task.build_id.as_str(),
                if task.in_task_group() { task.task_group.as_str() } else { "-" }
            ),
            None => println!("  {:>4}  {}", position + 1, id),
        }
    }
}

/// List the configured ranking chain.
pub fn rules(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_scheduler_config(config_path)?;
    let registry = RuleRegistry::standard()?;
    let chain = registry.chain(&config.rules)?;

    println!("Ranking rules (first decisive rule wins):");
    for (position, key) in chain.keys().into_iter().enumerate() {
        let description = registry
            .get(key)
            .map(|rule| rule.description())
            .unwrap_or_default();
        println!(
            "  {}. {} {}",
            position + 1,
            style(format!("{key:<16}")).cyan(),
            style(description).dim()
        );
    }

    Ok(())
}
