/// Metadata analysis benchmarks
///
/// Synthetic wide scatter: many tasks, each scattered over many shards with a
/// share of preempted retries. Measures normalization, preemption analysis
/// (sequential and with the worker pool) and call tree construction.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use runlens::call_tree::build_call_tree;
use runlens::config::PreemptionConfig;
use runlens::metadata::normalize;
use runlens::preemption::{analyze_workflow, analyze_workflow_with_config};
use serde_json::{json, Value};
use std::time::Duration;

fn attempt(shard: usize, attempt: usize, preempted: bool) -> Value {
    let start_minute = shard % 60;
    json!({
        "shardIndex": shard,
        "attempt": attempt,
        "executionStatus": if preempted { "Preempted" } else { "Done" },
        "start": format!("2024-01-01T{:02}:{:02}:00Z", attempt, start_minute),
        "end": format!("2024-01-01T{:02}:{:02}:00Z", attempt + 1, start_minute),
        "vmCostPerHour": 0.25,
        "runtimeAttributes": {"cpu": "8", "memory": "32 GB", "preemptible": "3"}
    })
}

/// Metadata document with `tasks` task names scattered `shards` ways
fn wide_scatter(tasks: usize, shards: usize) -> Vec<u8> {
    let mut calls = serde_json::Map::new();
    for task in 0..tasks {
        let mut entries = Vec::new();
        for shard in 0..shards {
            // Every fifth shard needed a retry
            if shard % 5 == 0 {
                entries.push(attempt(shard, 1, true));
                entries.push(attempt(shard, 2, false));
            } else {
                entries.push(attempt(shard, 1, false));
            }
        }
        calls.insert(format!("main.task_{}", task), Value::Array(entries));
    }
    let doc = json!({
        "id": "bench-wf",
        "workflowName": "main",
        "status": "Succeeded",
        "calls": calls
    });
    serde_json::to_vec(&doc).unwrap()
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    group.measurement_time(Duration::from_secs(5));

    for shards in [10, 100, 500].iter() {
        let raw = wide_scatter(20, *shards);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(shards), &raw, |b, raw| {
            b.iter(|| black_box(normalize(raw).unwrap()));
        });
    }

    group.finish();
}

fn bench_preemption(c: &mut Criterion) {
    let mut group = c.benchmark_group("preemption_analysis");
    group.measurement_time(Duration::from_secs(5));

    let workflow = normalize(&wide_scatter(64, 200)).unwrap();
    group.throughput(Throughput::Elements(workflow.attempt_count() as u64));

    group.bench_function("sequential", |b| {
        b.iter(|| black_box(analyze_workflow(&workflow)));
    });

    for threads in [2, 4, 8].iter() {
        let config = PreemptionConfig {
            worker_threads: *threads,
            ..PreemptionConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("workers", threads), &config, |b, config| {
            b.iter(|| black_box(analyze_workflow_with_config(&workflow, config)));
        });
    }

    group.finish();
}

fn bench_call_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("call_tree");
    group.measurement_time(Duration::from_secs(5));

    let workflow = normalize(&wide_scatter(64, 200)).unwrap();

    group.bench_function("build", |b| {
        b.iter(|| black_box(build_call_tree(&workflow).len()));
    });

    group.bench_function("visible_nodes_expanded", |b| {
        let mut tree = build_call_tree(&workflow);
        tree.expand_all();
        b.iter(|| black_box(tree.visible_nodes().len()));
    });

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_preemption, bench_call_tree);
criterion_main!(benches);
