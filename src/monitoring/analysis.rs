// Resource efficiency analysis
//
// CPU is sampled as a utilization percentage, so its efficiency is the
// average. Memory and disk are sampled as usage against a fixed allocation,
// so their efficiency is the peak over the allocation.

use crate::config::MonitoringConfig;
use crate::error::Result;
use crate::monitoring::parser::{parse_monitoring_log, ResourceLog};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use trueno::Vector;

/// Message used when no recommendation rule fires
pub const WELL_OPTIMIZED: &str = "Resource allocation appears well optimized";

/// Utilization statistics and sizing recommendations for one monitored task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyReport {
    pub cpu_peak_percent: f64,
    pub cpu_avg_percent: f64,
    /// Average utilization as a fraction of one allocation
    pub cpu_efficiency: f64,

    pub mem_peak_mb: f64,
    pub mem_avg_mb: f64,
    pub mem_total_mb: f64,
    /// Peak usage over allocation
    pub mem_efficiency: f64,

    pub disk_peak_gb: f64,
    pub disk_avg_gb: f64,
    pub disk_total_gb: f64,
    pub disk_efficiency: f64,

    pub sample_count: usize,
    pub first_sample: NaiveDateTime,
    pub last_sample: NaiveDateTime,
    pub duration_secs: i64,

    /// Never empty: falls back to a single "well optimized" message
    pub recommendations: Vec<String>,
}

impl EfficiencyReport {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(
            report,
            "Resource usage over {} samples ({}s, {} to {})",
            self.sample_count, self.duration_secs, self.first_sample, self.last_sample
        );
        let _ = writeln!(
            report,
            "CPU:    peak {:.1}%, avg {:.1}%, efficiency {:.1}%",
            self.cpu_peak_percent,
            self.cpu_avg_percent,
            self.cpu_efficiency * 100.0
        );
        let _ = writeln!(
            report,
            "Memory: peak {:.0} MB of {:.0} MB, avg {:.0} MB, efficiency {:.1}%",
            self.mem_peak_mb,
            self.mem_total_mb,
            self.mem_avg_mb,
            self.mem_efficiency * 100.0
        );
        let _ = writeln!(
            report,
            "Disk:   peak {:.1} GB of {:.1} GB, avg {:.1} GB, efficiency {:.1}%",
            self.disk_peak_gb,
            self.disk_total_gb,
            self.disk_avg_gb,
            self.disk_efficiency * 100.0
        );
        report.push_str("\nRecommendations:\n");
        for rec in &self.recommendations {
            let _ = writeln!(report, "  - {}", rec);
        }
        report
    }
}

/// Parse and analyze a resource log with default thresholds
pub fn analyze_monitoring_log(text: &str) -> Result<EfficiencyReport> {
    analyze_monitoring_log_with_config(text, &MonitoringConfig::default())
}

pub fn analyze_monitoring_log_with_config(
    text: &str,
    config: &MonitoringConfig,
) -> Result<EfficiencyReport> {
    let log = parse_monitoring_log(text)?;
    Ok(analyze_with_config(&log, config))
}

/// Analyze an already parsed log with default thresholds
pub fn analyze(log: &ResourceLog) -> EfficiencyReport {
    analyze_with_config(log, &MonitoringConfig::default())
}

pub fn analyze_with_config(log: &ResourceLog, config: &MonitoringConfig) -> EfficiencyReport {
    let (cpu_peak, cpu_avg) = peak_and_mean(log.samples.iter().map(|s| s.cpu_percent));
    let (mem_peak, mem_avg) = peak_and_mean(log.samples.iter().map(|s| s.mem_used_mb));
    let (disk_peak, disk_avg) = peak_and_mean(log.samples.iter().map(|s| s.disk_used_gb));

    let first_sample = log
        .samples
        .iter()
        .map(|s| s.timestamp)
        .min()
        .unwrap_or_default();
    let last_sample = log
        .samples
        .iter()
        .map(|s| s.timestamp)
        .max()
        .unwrap_or_default();

    let mut report = EfficiencyReport {
        cpu_peak_percent: cpu_peak,
        cpu_avg_percent: cpu_avg,
        cpu_efficiency: cpu_avg / 100.0,
        mem_peak_mb: mem_peak,
        mem_avg_mb: mem_avg,
        mem_total_mb: log.mem_total_mb,
        mem_efficiency: ratio(mem_peak, log.mem_total_mb),
        disk_peak_gb: disk_peak,
        disk_avg_gb: disk_avg,
        disk_total_gb: log.disk_total_gb,
        disk_efficiency: ratio(disk_peak, log.disk_total_gb),
        sample_count: log.samples.len(),
        first_sample,
        last_sample,
        duration_secs: (last_sample - first_sample).num_seconds(),
        recommendations: Vec::new(),
    };
    report.recommendations = recommend(&report, config);
    report
}

/// Peak is an exact logged value; the mean goes through trueno in f32
fn peak_and_mean(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let peak = values.iter().copied().fold(f64::MIN, f64::max);
    let samples: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    let mean = Vector::from_slice(&samples).mean().unwrap_or(0.0);
    (peak, f64::from(mean))
}

fn ratio(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total
    } else {
        0.0
    }
}

fn recommend(report: &EfficiencyReport, config: &MonitoringConfig) -> Vec<String> {
    let mut recs = Vec::new();

    if report.cpu_efficiency < config.cpu_low_efficiency {
        recs.push(format!(
            "CPU averaged {:.1}% utilization; consider requesting fewer cores",
            report.cpu_avg_percent
        ));
    }
    if report.cpu_peak_percent >= config.cpu_saturation_percent {
        recs.push(format!(
            "CPU peaked at {:.1}%; the task may be CPU-bound, consider more cores",
            report.cpu_peak_percent
        ));
    }

    if report.mem_efficiency < config.memory_low_efficiency
        && report.mem_total_mb > config.memory_min_total_mb
    {
        let suggested = (report.mem_peak_mb * config.headroom_factor).max(config.memory_floor_mb);
        recs.push(format!(
            "Memory peaked at {:.0} MB of {:.0} MB allocated; consider reducing memory to {:.0} MB",
            report.mem_peak_mb, report.mem_total_mb, suggested
        ));
    } else if report.mem_efficiency > config.memory_high_efficiency {
        recs.push(format!(
            "Memory peaked at {:.1}% of its allocation; consider increasing memory to {:.0} MB to avoid out-of-memory failures",
            report.mem_efficiency * 100.0,
            report.mem_peak_mb * config.headroom_factor
        ));
    }

    if report.disk_efficiency < config.disk_low_efficiency
        && report.disk_total_gb > config.disk_min_total_gb
    {
        let suggested = (report.disk_peak_gb * config.headroom_factor).max(config.disk_floor_gb);
        recs.push(format!(
            "Disk peaked at {:.1} GB of {:.1} GB allocated; consider reducing disk to {:.0} GB",
            report.disk_peak_gb,
            report.disk_total_gb,
            suggested
        ));
    } else if report.disk_efficiency > config.disk_high_efficiency {
        recs.push(format!(
            "Disk peaked at {:.1}% of its allocation; consider increasing disk to {:.0} GB",
            report.disk_efficiency * 100.0,
            report.disk_peak_gb * config.headroom_factor
        ));
    }

    if recs.is_empty() {
        recs.push(WELL_OPTIMIZED.to_string());
    }
    recs
}
