// Cost-Weighted Preemption Analysis
//
// Objective: rank retried tasks by the resource cost they wasted, not by how
// often they were retried.
//
// Key Insight: ten cheap preemptions of a 2-minute task matter less than one
// preemption 5 hours into a 64-core alignment. Attempts are correlated per
// (task, shard), costed, and every non-final attempt is charged as waste.
//
// Modeling simplification: waste is "all attempts except the last", so a
// retry caused by a transient infrastructure failure is charged the same way
// as a genuine preemption.

mod cost;
mod shard;
mod summary;

pub use cost::attempt_cost;
pub use shard::{cost_efficiency, group_by_shard, shard_stats, task_shards, TaskShardStats};
pub use summary::{
    analyze_calls, analyze_workflow, analyze_workflow_with_config, ProblematicTask,
    TaskPreemptionStats, WorkflowPreemptionSummary,
};

#[cfg(test)]
mod tests;
