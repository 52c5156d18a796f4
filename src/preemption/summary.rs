// Workflow-level preemption summary
//
// Aggregates shard statistics per task, weighs each task by its share of the
// workflow's wasted cost, and ranks the tasks worth fixing.

use crate::config::PreemptionConfig;
use crate::metadata::{Call, Workflow};
use crate::preemption::shard::{cost_efficiency, task_shards, TaskShardStats};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Preemption statistics for one task, across its preemptible shards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPreemptionStats {
    pub task_name: String,
    /// Number of preemptible shards aggregated
    pub shard_count: usize,
    pub total_attempts: u32,
    pub preempted_count: u32,
    /// Mean shard efficiency score
    pub avg_efficiency: f64,
    pub total_cost: f64,
    pub wasted_cost: f64,
    pub cost_efficiency: f64,
    /// This task's share of the workflow's wasted cost, in percent
    pub impact_percent: f64,
    pub shards: Vec<TaskShardStats>,
}

/// A task flagged for wasting significant cost on preempted attempts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblematicTask {
    #[serde(flatten)]
    pub stats: TaskPreemptionStats,
    pub recommendation: String,
}

/// Preemption and cost summary for a whole workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPreemptionSummary {
    pub workflow_id: String,
    pub workflow_name: String,
    /// All task names, preemptible or not
    pub total_tasks: usize,
    pub preemptible_tasks: usize,
    pub total_attempts: u32,
    pub total_preemptions: u32,
    /// Mean task efficiency (1.0 when no task is preemptible)
    pub overall_efficiency: f64,
    pub total_cost: f64,
    pub wasted_cost: f64,
    pub cost_efficiency: f64,
    /// Every preemptible task, in task name order
    pub tasks: Vec<TaskPreemptionStats>,
    /// Problematic tasks, highest wasted cost first
    pub problematic_tasks: Vec<ProblematicTask>,
}

impl WorkflowPreemptionSummary {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(
            report,
            "Preemption summary for {} ({})",
            display_or(&self.workflow_name, "<unnamed>"),
            display_or(&self.workflow_id, "<no id>")
        );
        let _ = writeln!(
            report,
            "Tasks: {} total, {} preemptible",
            self.total_tasks, self.preemptible_tasks
        );
        let _ = writeln!(
            report,
            "Attempts: {} ({} preempted), efficiency {:.1}%",
            self.total_attempts,
            self.total_preemptions,
            self.overall_efficiency * 100.0
        );
        let _ = writeln!(
            report,
            "Cost: {:.4} total, {:.4} wasted ({:.1}% cost efficiency)",
            self.total_cost,
            self.wasted_cost,
            self.cost_efficiency * 100.0
        );

        if self.problematic_tasks.is_empty() {
            report.push_str("\nNo problematic tasks.\n");
            return report;
        }

        let _ = writeln!(report, "\nProblematic tasks ({}):", self.problematic_tasks.len());
        for task in &self.problematic_tasks {
            let s = &task.stats;
            let _ = writeln!(
                report,
                "  {}: {} attempts, {} preempted, wasted {:.4} ({:.1}% of waste, {:.1}% cost efficiency)",
                s.task_name,
                s.total_attempts,
                s.preempted_count,
                s.wasted_cost,
                s.impact_percent,
                s.cost_efficiency * 100.0
            );
            let _ = writeln!(report, "    {}", task.recommendation);
        }
        report
    }
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Analyze a workflow with default settings
///
/// Nested sub-workflow calls are flattened into the analyzed call map, so
/// their cost counts toward the root summary.
pub fn analyze_workflow(workflow: &Workflow) -> WorkflowPreemptionSummary {
    analyze_workflow_with_config(workflow, &PreemptionConfig::default())
}

/// Analyze a workflow
pub fn analyze_workflow_with_config(
    workflow: &Workflow,
    config: &PreemptionConfig,
) -> WorkflowPreemptionSummary {
    let calls: Cow<'_, BTreeMap<String, Vec<Call>>> = if config.flatten_subworkflows {
        Cow::Owned(workflow.flatten_calls(&config.name_separator))
    } else {
        Cow::Borrowed(&workflow.calls)
    };
    analyze_calls(&workflow.id, &workflow.name, &calls, config)
}

/// Analyze an arbitrary call map (e.g. one the caller already flattened)
///
/// Never fails: malformed numeric fields have already degraded to defaults.
pub fn analyze_calls(
    workflow_id: &str,
    workflow_name: &str,
    calls: &BTreeMap<String, Vec<Call>>,
    config: &PreemptionConfig,
) -> WorkflowPreemptionSummary {
    let per_task = compute_task_shards(calls, config);
    let total_tasks = per_task.len();

    // Non-preemptible shards are left out of every aggregate below
    let preemptible: Vec<(String, Vec<TaskShardStats>)> = per_task
        .into_iter()
        .map(|(name, shards)| {
            let kept: Vec<_> = shards.into_iter().filter(|s| s.is_preemptible).collect();
            (name, kept)
        })
        .filter(|(_, shards)| !shards.is_empty())
        .collect();

    let workflow_wasted: f64 = preemptible
        .iter()
        .flat_map(|(_, shards)| shards.iter().map(|s| s.wasted_cost))
        .sum();

    let tasks: Vec<TaskPreemptionStats> = preemptible
        .into_iter()
        .map(|(name, shards)| aggregate_task(name, shards, workflow_wasted))
        .collect();

    let total_attempts = tasks.iter().map(|t| t.total_attempts).sum();
    let total_preemptions = tasks.iter().map(|t| t.preempted_count).sum();
    let total_cost: f64 = tasks.iter().map(|t| t.total_cost).sum();
    let overall_efficiency = if tasks.is_empty() {
        1.0
    } else {
        tasks.iter().map(|t| t.avg_efficiency).sum::<f64>() / tasks.len() as f64
    };

    let mut problematic_tasks: Vec<ProblematicTask> = tasks
        .iter()
        .filter(|t| is_problematic(t, config))
        .map(|t| ProblematicTask {
            recommendation: recommend(t, config),
            stats: t.clone(),
        })
        .collect();
    // Stable: equal waste keeps task name order
    problematic_tasks.sort_by(|a, b| b.stats.wasted_cost.total_cmp(&a.stats.wasted_cost));

    debug!(
        workflow_id,
        total_tasks,
        preemptible_tasks = tasks.len(),
        problematic = problematic_tasks.len(),
        wasted_cost = workflow_wasted,
        "preemption analysis complete"
    );

    WorkflowPreemptionSummary {
        workflow_id: workflow_id.to_string(),
        workflow_name: workflow_name.to_string(),
        total_tasks,
        preemptible_tasks: tasks.len(),
        total_attempts,
        total_preemptions,
        overall_efficiency,
        total_cost,
        wasted_cost: workflow_wasted,
        cost_efficiency: cost_efficiency(workflow_wasted, total_cost),
        tasks,
        problematic_tasks,
    }
}

/// A task is problematic when it lost attempts to preemption and either
/// wasted too large a share of its own cost or of the workflow's waste
fn is_problematic(task: &TaskPreemptionStats, config: &PreemptionConfig) -> bool {
    task.preempted_count > 0
        && (task.cost_efficiency < config.cost_efficiency_threshold
            || task.impact_percent > config.impact_threshold_percent)
}

fn recommend(task: &TaskPreemptionStats, config: &PreemptionConfig) -> String {
    let exhausted = task
        .shards
        .iter()
        .filter(|s| s.max_preemptible > 0 && s.preempted_count >= s.max_preemptible)
        .count();

    if exhausted > 0 {
        format!(
            "Preemptible budget exhausted on {} of {} shard(s); consider running {} on non-preemptible capacity",
            exhausted, task.shard_count, task.task_name
        )
    } else if task.cost_efficiency < config.cost_efficiency_threshold {
        format!(
            "{:.0}% of this task's cost went to retried attempts; consider fewer preemptible attempts or checkpointing",
            (1.0 - task.cost_efficiency) * 100.0
        )
    } else {
        format!(
            "Accounts for {:.1}% of the workflow's wasted cost; prioritize it when reducing preemptions",
            task.impact_percent
        )
    }
}

fn aggregate_task(
    task_name: String,
    shards: Vec<TaskShardStats>,
    workflow_wasted: f64,
) -> TaskPreemptionStats {
    let total_cost: f64 = shards.iter().map(|s| s.total_cost).sum();
    let wasted_cost: f64 = shards.iter().map(|s| s.wasted_cost).sum();
    let avg_efficiency =
        shards.iter().map(|s| s.efficiency_score).sum::<f64>() / shards.len().max(1) as f64;
    let impact_percent = if workflow_wasted > 0.0 {
        wasted_cost / workflow_wasted * 100.0
    } else {
        0.0
    };

    TaskPreemptionStats {
        task_name,
        shard_count: shards.len(),
        total_attempts: shards.iter().map(|s| s.total_attempts).sum(),
        preempted_count: shards.iter().map(|s| s.preempted_count).sum(),
        avg_efficiency,
        total_cost,
        wasted_cost,
        cost_efficiency: cost_efficiency(wasted_cost, total_cost),
        impact_percent,
        shards,
    }
}

type TaskShards = (String, Vec<TaskShardStats>);

/// Shard statistics for every task, in task name order
///
/// With more than one worker thread the task list is split into contiguous
/// chunks processed on scoped threads; chunks are joined in order, so the
/// result is identical to the sequential path.
fn compute_task_shards(
    calls: &BTreeMap<String, Vec<Call>>,
    config: &PreemptionConfig,
) -> Vec<TaskShards> {
    let entries: Vec<(&String, &Vec<Call>)> = calls.iter().collect();
    let sequential = |chunk: &[(&String, &Vec<Call>)]| -> Vec<TaskShards> {
        chunk
            .iter()
            .map(|(name, attempts)| ((*name).clone(), task_shards(name, attempts, config)))
            .collect()
    };

    if config.worker_threads <= 1 || entries.len() < 2 {
        return sequential(&entries);
    }

    let chunk_size = entries.len().div_ceil(config.worker_threads);
    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = entries
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move |_| sequential(chunk)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join())
            .collect::<Result<Vec<_>, _>>()
    });

    match joined {
        Ok(Ok(chunks)) => chunks.into_iter().flatten().collect(),
        _ => {
            warn!("preemption worker panicked, recomputing sequentially");
            sequential(&entries)
        }
    }
}
