//! Analyzer configuration
//!
//! All thresholds used by the normalizer, the preemption analyzer and the
//! resource monitoring analyzer live here so they can be tuned per project
//! without recompilation. Every section has working defaults; a TOML file only
//! needs to name the values it overrides.
//!
//! # Example TOML
//!
//! ```toml
//! [normalizer]
//! max_depth = 8
//!
//! [preemption]
//! cost_efficiency_threshold = 0.75
//! worker_threads = 4
//!
//! [monitoring]
//! headroom_factor = 1.5
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration for every analyzer in the crate
///
/// # Example
/// ```
/// use runlens::config::AnalyzerConfig;
///
/// let config = AnalyzerConfig::default();
/// assert_eq!(config.preemption.cost_efficiency_threshold, 0.7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub normalizer: NormalizerConfig,
    pub preemption: PreemptionConfig,
    pub monitoring: MonitoringConfig,
}

/// Settings for metadata normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Maximum sub-workflow nesting followed before embedded metadata is dropped
    ///
    /// Real executions nest a handful of levels; the limit guards against
    /// adversarial documents driving unbounded recursion.
    pub max_depth: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { max_depth: 16 }
    }
}

/// Settings for the preemption cost analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreemptionConfig {
    /// A task whose cost efficiency falls below this value is a candidate problem
    pub cost_efficiency_threshold: f64,

    /// A task whose share of the workflow's wasted cost exceeds this percentage
    /// is a candidate problem
    pub impact_threshold_percent: f64,

    /// Duration floor (hours) used when estimating cost for attempts with no
    /// usable duration
    pub min_duration_hours: f64,

    /// Flatten nested sub-workflow calls into the analyzed call map
    pub flatten_subworkflows: bool,

    /// Separator between a parent call name and a nested call name
    pub name_separator: String,

    /// Worker threads used for per-task aggregation (1 = sequential)
    pub worker_threads: usize,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            cost_efficiency_threshold: 0.7,
            impact_threshold_percent: 10.0,
            min_duration_hours: 0.01, // 36 seconds
            flatten_subworkflows: true,
            name_separator: "/".to_string(),
            worker_threads: 1,
        }
    }
}

/// Thresholds for resource monitoring recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Average CPU efficiency below which fewer cores are suggested
    pub cpu_low_efficiency: f64,
    /// Peak CPU percentage considered saturated
    pub cpu_saturation_percent: f64,
    /// Memory efficiency (peak/total) below which the allocation is oversized
    pub memory_low_efficiency: f64,
    /// Memory efficiency above which the task is close to running out of memory
    pub memory_high_efficiency: f64,
    /// Allocations at or below this size (MB) are never reported as oversized
    pub memory_min_total_mb: f64,
    /// Disk efficiency (peak/total) below which the disk is oversized
    pub disk_low_efficiency: f64,
    /// Disk efficiency above which the task is close to filling its disk
    pub disk_high_efficiency: f64,
    /// Disks at or below this size (GB) are never reported as oversized
    pub disk_min_total_gb: f64,
    /// Multiplier applied to the observed peak when suggesting a new size
    pub headroom_factor: f64,
    /// Smallest memory suggestion (MB)
    pub memory_floor_mb: f64,
    /// Smallest disk suggestion (GB)
    pub disk_floor_gb: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            cpu_low_efficiency: 0.3,
            cpu_saturation_percent: 90.0,
            memory_low_efficiency: 0.5,
            memory_high_efficiency: 0.9,
            memory_min_total_mb: 2000.0,
            disk_low_efficiency: 0.5,
            disk_high_efficiency: 0.9,
            disk_min_total_gb: 10.0,
            headroom_factor: 1.3,
            memory_floor_mb: 1024.0,
            disk_floor_gb: 10.0,
        }
    }
}

impl AnalyzerConfig {
    /// Flag more tasks as problematic (catches waste early)
    pub fn strict() -> Self {
        Self {
            preemption: PreemptionConfig {
                cost_efficiency_threshold: 0.8,
                impact_threshold_percent: 5.0,
                ..PreemptionConfig::default()
            },
            ..Self::default()
        }
    }

    /// Flag only tasks with severe waste
    pub fn permissive() -> Self {
        Self {
            preemption: PreemptionConfig {
                cost_efficiency_threshold: 0.5,
                impact_threshold_percent: 25.0,
                ..PreemptionConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML analyzer configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file can't be read, has invalid TOML syntax, or
    /// fails validation.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.normalizer.max_depth == 0 {
            anyhow::bail!("normalizer.max_depth must be >= 1");
        }

        let p = &self.preemption;
        check_unit_interval("preemption.cost_efficiency_threshold", p.cost_efficiency_threshold)?;
        if !(0.0..=100.0).contains(&p.impact_threshold_percent) {
            anyhow::bail!(
                "preemption.impact_threshold_percent must be in [0, 100], got {}",
                p.impact_threshold_percent
            );
        }
        if p.min_duration_hours <= 0.0 {
            anyhow::bail!(
                "preemption.min_duration_hours must be positive, got {}",
                p.min_duration_hours
            );
        }
        if p.worker_threads == 0 {
            anyhow::bail!("preemption.worker_threads must be >= 1");
        }
        if p.name_separator.is_empty() {
            anyhow::bail!("preemption.name_separator must not be empty");
        }

        let m = &self.monitoring;
        check_unit_interval("monitoring.cpu_low_efficiency", m.cpu_low_efficiency)?;
        check_unit_interval("monitoring.memory_low_efficiency", m.memory_low_efficiency)?;
        check_unit_interval("monitoring.memory_high_efficiency", m.memory_high_efficiency)?;
        check_unit_interval("monitoring.disk_low_efficiency", m.disk_low_efficiency)?;
        check_unit_interval("monitoring.disk_high_efficiency", m.disk_high_efficiency)?;
        if m.headroom_factor <= 0.0 {
            anyhow::bail!(
                "monitoring.headroom_factor must be positive, got {}",
                m.headroom_factor
            );
        }

        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must be in [0, 1], got {}", name, value);
    }
    Ok(())
}
