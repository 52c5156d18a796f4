// Preemption analysis tests
//
// Realistic retry patterns: preempted alignments, budget exhaustion,
// non-preemptible retries, nested sub-workflows.

use super::*;
use crate::config::PreemptionConfig;
use crate::metadata::{Call, ExecutionStatus, Workflow};
use chrono::{DateTime, TimeZone, Utc};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn attempt(
    name: &str,
    shard: i64,
    attempt: u32,
    minutes: i64,
    rate: f64,
    preemptible: &str,
    status: ExecutionStatus,
) -> Call {
    let start = base_time() + chrono::Duration::hours(i64::from(attempt));
    let mut call = Call {
        name: name.to_string(),
        shard_index: shard,
        attempt,
        status,
        start: Some(start),
        end: Some(start + chrono::Duration::minutes(minutes)),
        ..Call::default()
    };
    call.resources.cost_per_hour = rate;
    call.resources.preemptible = preemptible.to_string();
    call
}

fn workflow(calls: Vec<Call>) -> Workflow {
    let mut wf = Workflow {
        id: "wf-1".to_string(),
        name: "main".to_string(),
        ..Workflow::default()
    };
    for call in calls {
        wf.calls.entry(call.name.clone()).or_default().push(call);
    }
    wf
}

/// Two attempts of 30 and 60 minutes at $0.10/hour
#[test]
fn test_two_attempt_cost_weighting() {
    let calls = vec![
        attempt("Task1", -1, 1, 30, 0.10, "2", ExecutionStatus::Preempted),
        attempt("Task1", -1, 2, 60, 0.10, "2", ExecutionStatus::Done),
    ];
    let stats = task_shards("Task1", &calls, &PreemptionConfig::default());
    let shard = &stats[0];

    assert!((shard.total_cost - 0.15).abs() < 1e-9);
    assert!((shard.wasted_cost - 0.05).abs() < 1e-9);
    assert!((shard.cost_efficiency - 2.0 / 3.0).abs() < 1e-4);
    assert_eq!(shard.preempted_count, 1);
    assert_eq!(shard.final_status, ExecutionStatus::Done);
}

/// Budget of 5 preemptible attempts, 3 lost
#[test]
fn test_preemption_budget_efficiency() {
    let calls = vec![
        attempt("main.call_variants", -1, 1, 0, 0.0, "5", ExecutionStatus::Preempted),
        attempt("main.call_variants", -1, 2, 0, 0.0, "5", ExecutionStatus::Preempted),
        attempt("main.call_variants", -1, 3, 0, 0.0, "5", ExecutionStatus::Preempted),
        attempt("main.call_variants", -1, 4, 0, 0.0, "5", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));

    let task = &summary.tasks[0];
    assert_eq!(task.preempted_count, 3);
    assert!((task.avg_efficiency - 0.4).abs() < 1e-9);
    // Four floor-priced attempts, three wasted
    assert!((task.cost_efficiency - 0.25).abs() < 1e-9);

    assert_eq!(summary.problematic_tasks.len(), 1);
    assert_eq!(summary.problematic_tasks[0].stats.task_name, "main.call_variants");
}

#[test]
fn test_ranking_and_exclusions() {
    let calls = vec![
        // 1.0 wasted of 2.0
        attempt("main.big", -1, 1, 60, 1.0, "3", ExecutionStatus::Preempted),
        attempt("main.big", -1, 2, 60, 1.0, "3", ExecutionStatus::Done),
        // 0.1 wasted of 1.1: efficient and below 10% impact
        attempt("main.small", -1, 1, 6, 1.0, "3", ExecutionStatus::Preempted),
        attempt("main.small", -1, 2, 60, 1.0, "3", ExecutionStatus::Done),
        // No preemption
        attempt("main.clean", -1, 1, 60, 1.0, "3", ExecutionStatus::Done),
        // Retried, but not preemptible
        attempt("main.regular", -1, 1, 60, 1.0, "false", ExecutionStatus::RetryableFailure),
        attempt("main.regular", -1, 2, 60, 1.0, "false", ExecutionStatus::RetryableFailure),
        attempt("main.regular", -1, 3, 60, 1.0, "false", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));

    assert_eq!(summary.total_tasks, 4);
    assert_eq!(summary.preemptible_tasks, 3);
    assert!(summary.tasks.iter().all(|t| t.task_name != "main.regular"));
    assert_eq!(summary.total_preemptions, 2);
    assert!((summary.wasted_cost - 1.1).abs() < 1e-9);

    let big = summary.tasks.iter().find(|t| t.task_name == "main.big").unwrap();
    assert!((big.impact_percent - 1.0 / 1.1 * 100.0).abs() < 1e-6);

    assert_eq!(summary.problematic_tasks.len(), 1);
    assert_eq!(summary.problematic_tasks[0].stats.task_name, "main.big");
}

#[test]
fn test_non_preemptible_never_aggregated() {
    let calls = vec![
        attempt("main.a", -1, 1, 60, 1.0, "", ExecutionStatus::Failed),
        attempt("main.a", -1, 2, 60, 1.0, "", ExecutionStatus::Done),
        attempt("main.b", 0, 1, 60, 1.0, "0", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));

    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.preemptible_tasks, 0);
    assert!(summary.tasks.is_empty());
    assert_eq!(summary.total_cost, 0.0);
    assert_eq!(summary.cost_efficiency, 1.0);
    assert_eq!(summary.overall_efficiency, 1.0);
}

#[test]
fn test_equal_waste_keeps_name_order() {
    let calls = vec![
        attempt("main.b", -1, 1, 60, 1.0, "2", ExecutionStatus::Preempted),
        attempt("main.b", -1, 2, 60, 1.0, "2", ExecutionStatus::Done),
        attempt("main.a", -1, 1, 60, 1.0, "2", ExecutionStatus::Preempted),
        attempt("main.a", -1, 2, 60, 1.0, "2", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));

    let names: Vec<&str> = summary
        .problematic_tasks
        .iter()
        .map(|p| p.stats.task_name.as_str())
        .collect();
    assert_eq!(names, vec!["main.a", "main.b"]);
}

#[test]
fn test_scattered_shards_aggregate_per_task() {
    let calls = vec![
        attempt("main.align", 0, 1, 60, 1.0, "3", ExecutionStatus::Preempted),
        attempt("main.align", 0, 2, 60, 1.0, "3", ExecutionStatus::Done),
        attempt("main.align", 1, 1, 60, 1.0, "3", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));
    let task = &summary.tasks[0];

    assert_eq!(task.shard_count, 2);
    assert_eq!(task.total_attempts, 3);
    assert_eq!(task.preempted_count, 1);
    // Shard 0: 1 - 1/3, shard 1: 1 - 0/3
    assert!((task.avg_efficiency - (2.0 / 3.0 + 1.0) / 2.0).abs() < 1e-9);
    assert!((task.cost_efficiency - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_budget_exhaustion_recommendation() {
    let calls = vec![
        attempt("main.t", -1, 1, 60, 1.0, "1", ExecutionStatus::Preempted),
        attempt("main.t", -1, 2, 60, 1.0, "1", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));
    assert!(summary.problematic_tasks[0]
        .recommendation
        .contains("non-preemptible"));
}

#[test]
fn test_subworkflow_costs_flow_to_root() {
    let nested = workflow(vec![
        attempt("sub.t", -1, 1, 60, 1.0, "2", ExecutionStatus::Preempted),
        attempt("sub.t", -1, 2, 60, 1.0, "2", ExecutionStatus::Done),
    ]);
    let mut invocation = attempt("main.sub", -1, 1, 180, 0.0, "", ExecutionStatus::Done);
    invocation.sub_workflow = Some(Box::new(nested));
    let root = workflow(vec![invocation]);

    let summary = analyze_workflow(&root);
    assert_eq!(summary.tasks.len(), 1);
    assert_eq!(summary.tasks[0].task_name, "main.sub/sub.t");
    assert!((summary.wasted_cost - 1.0).abs() < 1e-9);

    let unflattened = analyze_workflow_with_config(
        &root,
        &PreemptionConfig {
            flatten_subworkflows: false,
            ..PreemptionConfig::default()
        },
    );
    assert_eq!(unflattened.total_tasks, 1);
    assert_eq!(unflattened.preemptible_tasks, 0);
}

#[test]
fn test_worker_pool_matches_sequential() {
    let mut calls = Vec::new();
    for task in 0..9 {
        let name = format!("main.task_{}", task);
        for shard in 0..4 {
            for a in 1..=(1 + (task + shard) as u32 % 3) {
                calls.push(attempt(
                    &name,
                    shard,
                    a,
                    10 * (task + 1),
                    0.05,
                    "3",
                    ExecutionStatus::Done,
                ));
            }
        }
    }
    let wf = workflow(calls);

    let sequential = analyze_workflow(&wf);
    let parallel = analyze_workflow_with_config(
        &wf,
        &PreemptionConfig {
            worker_threads: 4,
            ..PreemptionConfig::default()
        },
    );
    assert_eq!(sequential, parallel);
}

#[test]
fn test_report_string() {
    let calls = vec![
        attempt("main.big", -1, 1, 60, 1.0, "3", ExecutionStatus::Preempted),
        attempt("main.big", -1, 2, 60, 1.0, "3", ExecutionStatus::Done),
    ];
    let report = analyze_workflow(&workflow(calls)).to_report_string();

    assert!(report.contains("Preemption summary for main (wf-1)"));
    assert!(report.contains("Problematic tasks (1):"));
    assert!(report.contains("main.big: 2 attempts, 1 preempted"));

    let empty = analyze_workflow(&Workflow::default()).to_report_string();
    assert!(empty.contains("<unnamed>"));
    assert!(empty.contains("No problematic tasks."));
}

#[test]
fn test_summary_serializes_flattened_problematic_task() {
    let calls = vec![
        attempt("main.big", -1, 1, 60, 1.0, "3", ExecutionStatus::Preempted),
        attempt("main.big", -1, 2, 60, 1.0, "3", ExecutionStatus::Done),
    ];
    let summary = analyze_workflow(&workflow(calls));
    let json = serde_json::to_value(&summary).unwrap();

    let problem = &json["problematic_tasks"][0];
    assert_eq!(problem["task_name"], "main.big");
    assert!(problem["recommendation"].is_string());
}
