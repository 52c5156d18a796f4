// Per-attempt cost estimation
//
// A known hourly rate and a real duration give an exact cost. Otherwise cost
// is estimated from the resource request (cpu × memory GB × hours), which is
// only meaningful relative to other estimates in the same workflow.

use crate::config::PreemptionConfig;
use crate::metadata::Call;

/// Estimated cost of a single attempt
///
/// Missing or non-positive cpu and memory count as 1; a missing or zero
/// duration counts as `min_duration_hours` so zero-length attempts still show
/// up in wasted-cost rankings.
///
/// # Example
/// ```
/// use runlens::config::PreemptionConfig;
/// use runlens::metadata::{Call, CallResources};
/// use runlens::preemption::attempt_cost;
///
/// let call = Call {
///     resources: CallResources { cpu: "2".into(), memory: "4 GB".into(), ..Default::default() },
///     ..Default::default()
/// };
///
/// // No timestamps: 2 cpu × 4 GB × 0.01 h floor
/// let cost = attempt_cost(&call, &PreemptionConfig::default());
/// assert!((cost - 0.08).abs() < 1e-9);
/// ```
pub fn attempt_cost(call: &Call, config: &PreemptionConfig) -> f64 {
    let hours = call.duration_hours();
    let rate = call.resources.cost_per_hour;

    if rate > 0.0 && hours > 0.0 {
        return rate * hours;
    }

    let cpu = positive_or_one(call.cpu_count());
    let memory_gb = positive_or_one(call.memory_gb());
    let hours = if hours > 0.0 {
        hours
    } else {
        config.min_duration_hours
    };

    cpu * memory_gb * hours
}

fn positive_or_one(value: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        1.0
    }
}
