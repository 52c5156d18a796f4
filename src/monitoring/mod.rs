// Resource monitoring analysis
//
// Reads the tab-separated log a monitoring sidecar writes next to a task
// (timestamp, CPU percent, memory and disk usage against their allocation)
// and turns it into utilization statistics plus sizing recommendations.

mod analysis;
mod parser;

pub use analysis::{
    analyze, analyze_monitoring_log, analyze_monitoring_log_with_config, analyze_with_config,
    EfficiencyReport, WELL_OPTIMIZED,
};
pub use parser::{
    parse_monitoring_log, ResourceLog, ResourceSample, REQUIRED_COLUMNS, TIMESTAMP_FORMAT,
};
