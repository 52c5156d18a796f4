// Per-shard attempt correlation
//
// All attempts of one (task, shard) pair are one logical unit of work. The
// final attempt decides whether the shard ran on preemptible capacity; every
// earlier attempt is counted as waste.

use crate::config::PreemptionConfig;
use crate::metadata::{Call, ExecutionStatus};
use crate::preemption::cost::attempt_cost;
use serde::Serialize;
use std::collections::BTreeMap;

/// Retry and cost statistics for one shard of a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskShardStats {
    pub task_name: String,
    /// Scatter index, -1 when not scattered
    pub shard_index: i64,
    pub total_attempts: u32,
    /// Attempts lost to preemption (every non-final attempt of a preemptible shard)
    pub preempted_count: u32,
    pub final_status: ExecutionStatus,
    pub is_preemptible: bool,
    /// Preemptible attempt budget of the final attempt
    pub max_preemptible: u32,
    /// Share of the preemption budget left unused, in [0, 1]
    pub efficiency_score: f64,
    pub total_cost: f64,
    /// Cost of every non-final attempt
    pub wasted_cost: f64,
    /// 1 - wasted/total, in [0, 1]
    pub cost_efficiency: f64,
}

/// Group a task's attempts by shard index, each group sorted by attempt ascending
pub fn group_by_shard(calls: &[Call]) -> BTreeMap<i64, Vec<&Call>> {
    let mut shards: BTreeMap<i64, Vec<&Call>> = BTreeMap::new();
    for call in calls {
        shards.entry(call.shard_index).or_default().push(call);
    }
    for attempts in shards.values_mut() {
        attempts.sort_by_key(|c| c.attempt);
    }
    shards
}

/// Compute statistics for the attempts of one shard
///
/// `attempts` must be sorted by attempt number ascending (see
/// [`group_by_shard`]); the last element is the current attempt. Returns
/// `None` for an empty attempt list.
pub fn shard_stats(
    task_name: &str,
    shard_index: i64,
    attempts: &[&Call],
    config: &PreemptionConfig,
) -> Option<TaskShardStats> {
    let final_attempt = attempts.last()?;
    let total_attempts = attempts.len() as u32;

    let is_preemptible = final_attempt.is_preemptible();
    let max_preemptible = final_attempt.max_preemptible();
    let preempted_count = if is_preemptible {
        total_attempts - 1
    } else {
        0
    };

    // Every non-final attempt is waste, whatever triggered the retry. This
    // charges transient infrastructure failures to preemption as well.
    let costs: Vec<f64> = attempts.iter().map(|c| attempt_cost(c, config)).collect();
    let total_cost: f64 = costs.iter().sum();
    let wasted_cost: f64 = costs[..costs.len() - 1].iter().sum();

    let efficiency_score = if max_preemptible > 0 {
        1.0 - f64::from(preempted_count) / f64::from(max_preemptible)
    } else {
        1.0 / f64::from(total_attempts)
    };

    Some(TaskShardStats {
        task_name: task_name.to_string(),
        shard_index,
        total_attempts,
        preempted_count,
        final_status: final_attempt.status.clone(),
        is_preemptible,
        max_preemptible,
        efficiency_score: efficiency_score.clamp(0.0, 1.0),
        total_cost,
        wasted_cost,
        cost_efficiency: cost_efficiency(wasted_cost, total_cost),
    })
}

/// Statistics for every shard of a task, ordered by shard index
pub fn task_shards(task_name: &str, calls: &[Call], config: &PreemptionConfig) -> Vec<TaskShardStats> {
    group_by_shard(calls)
        .into_iter()
        .filter_map(|(shard, attempts)| shard_stats(task_name, shard, &attempts, config))
        .collect()
}

/// 1 - wasted/total clamped to [0, 1]; exactly 1.0 when nothing was spent
pub fn cost_efficiency(wasted_cost: f64, total_cost: f64) -> f64 {
    if total_cost <= 0.0 {
        return 1.0;
    }
    (1.0 - wasted_cost / total_cost).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(shard: i64, attempt: u32, preemptible: &str) -> Call {
        let mut call = Call {
            name: "main.t".to_string(),
            shard_index: shard,
            attempt,
            ..Call::default()
        };
        call.resources.preemptible = preemptible.to_string();
        call
    }

    #[test]
    fn test_group_by_shard_sorts_attempts() {
        let calls = vec![attempt(1, 2, ""), attempt(0, 1, ""), attempt(1, 1, "")];
        let groups = group_by_shard(&calls);

        assert_eq!(groups.len(), 2);
        let attempts: Vec<u32> = groups[&1].iter().map(|c| c.attempt).collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[test]
    fn test_final_attempt_decides_preemptibility() {
        // First attempt preemptible, retry moved to regular capacity
        let calls = vec![attempt(-1, 1, "3"), attempt(-1, 2, "false")];
        let stats = task_shards("main.t", &calls, &PreemptionConfig::default());

        assert_eq!(stats.len(), 1);
        assert!(!stats[0].is_preemptible);
        assert_eq!(stats[0].preempted_count, 0);
        assert_eq!(stats[0].max_preemptible, 0);
    }

    #[test]
    fn test_efficiency_without_budget() {
        // preemptible = "true" → budget of 1
        let calls = vec![attempt(-1, 1, "true"), attempt(-1, 2, "true")];
        let stats = task_shards("main.t", &calls, &PreemptionConfig::default());
        assert_eq!(stats[0].max_preemptible, 1);
        assert_eq!(stats[0].efficiency_score, 0.0);

        // Not preemptible: 1 / attempts
        let calls = vec![attempt(-1, 1, ""), attempt(-1, 2, ""), attempt(-1, 3, ""), attempt(-1, 4, "")];
        let stats = task_shards("main.t", &calls, &PreemptionConfig::default());
        assert_eq!(stats[0].efficiency_score, 0.25);
    }

    #[test]
    fn test_budget_overrun_clamps_to_zero() {
        let calls: Vec<Call> = (1..=5).map(|a| attempt(-1, a, "2")).collect();
        let stats = task_shards("main.t", &calls, &PreemptionConfig::default());
        assert_eq!(stats[0].preempted_count, 4);
        assert_eq!(stats[0].efficiency_score, 0.0);
    }

    #[test]
    fn test_single_attempt_has_no_waste() {
        let calls = vec![attempt(0, 1, "3")];
        let stats = task_shards("main.t", &calls, &PreemptionConfig::default());
        assert_eq!(stats[0].wasted_cost, 0.0);
        assert_eq!(stats[0].cost_efficiency, 1.0);
        assert_eq!(stats[0].efficiency_score, 1.0);
    }

    #[test]
    fn test_cost_efficiency_bounds() {
        assert_eq!(cost_efficiency(0.0, 0.0), 1.0);
        assert_eq!(cost_efficiency(5.0, 10.0), 0.5);
        assert_eq!(cost_efficiency(20.0, 10.0), 0.0);
    }

    #[test]
    fn test_empty_attempts() {
        assert!(shard_stats("main.t", 0, &[], &PreemptionConfig::default()).is_none());
    }
}
