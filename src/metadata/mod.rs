// Execution metadata normalization
//
// Turns the engine's loosely-typed metadata export (a JSON document with
// calls, retries, scatter shards and embedded sub-workflow metadata) into the
// strongly-typed Workflow/Call/Failure model consumed by the analyzers.
//
// Key Insight: the engine schema is additive and partially populated for
// running workflows, so only an undecodable document is an error. Every
// field-level problem degrades to a zero value.

mod model;
mod normalizer;
mod units;

pub use model::{
    Call, CallResources, ExecutionStatus, Failure, Workflow, WorkflowStatus, MAX_FAILURE_DEPTH,
};
pub use normalizer::{
    normalize, normalize_value, normalize_with_config, parse_failures, parse_timestamp,
};
pub use units::{parse_cpu, parse_max_preemptible, parse_memory_gb, preemptible_enabled};
