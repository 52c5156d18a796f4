// Tab-separated resource log parsing
//
// The header row names the columns; data rows are read through that map so
// column order and extra columns don't matter. Rows with an unreadable
// timestamp are dropped, unreadable numbers read as 0.

use crate::error::{ParseError, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Timestamp format written by the monitoring script
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns every resource log must carry
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "timestamp",
    "cpu_percent",
    "mem_used_mb",
    "mem_total_mb",
    "disk_used_gb",
    "disk_total_gb",
];

/// One sampled row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub timestamp: NaiveDateTime,
    pub cpu_percent: f64,
    pub mem_used_mb: f64,
    pub disk_used_gb: f64,
}

/// Parsed resource log: the time series plus the allocation it ran against
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceLog {
    pub samples: Vec<ResourceSample>,
    /// Memory capacity from the first row reporting a non-zero value
    pub mem_total_mb: f64,
    /// Disk capacity from the first row reporting a non-zero value
    pub disk_total_gb: f64,
}

/// Parse a resource monitoring log
///
/// # Errors
///
/// `MissingHeader` for a blank log, `MissingColumns` when the header lacks a
/// required column, `NoDataPoints` when no row survives parsing.
///
/// # Example
/// ```
/// let log = "timestamp\tcpu_percent\tmem_used_mb\tmem_total_mb\tdisk_used_gb\tdisk_total_gb\n\
///            2024-01-01 10:00:00\t50\t1024\t4096\t5\t20\n";
/// let parsed = runlens::monitoring::parse_monitoring_log(log).unwrap();
/// assert_eq!(parsed.samples.len(), 1);
/// assert_eq!(parsed.mem_total_mb, 4096.0);
/// ```
pub fn parse_monitoring_log(text: &str) -> Result<ResourceLog> {
    let cleaned: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if cleaned.is_empty() {
        return Err(ParseError::MissingHeader);
    }
    let cleaned = cleaned.join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(cleaned.as_bytes());

    let columns = ColumnMap::from_header(reader.headers()?)?;

    let mut samples = Vec::new();
    let mut mem_total_mb = 0.0;
    let mut disk_total_gb = 0.0;

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(line = line + 2, error = %e, "skipping unreadable resource log row");
                continue;
            }
        };

        let raw_timestamp = columns.field(&record, Column::Timestamp);
        let Ok(timestamp) = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT) else {
            debug!(line = line + 2, timestamp = raw_timestamp, "skipping resource log row");
            continue;
        };

        if mem_total_mb == 0.0 {
            mem_total_mb = columns.number(&record, Column::MemTotal);
        }
        if disk_total_gb == 0.0 {
            disk_total_gb = columns.number(&record, Column::DiskTotal);
        }

        samples.push(ResourceSample {
            timestamp,
            cpu_percent: columns.number(&record, Column::Cpu),
            mem_used_mb: columns.number(&record, Column::MemUsed),
            disk_used_gb: columns.number(&record, Column::DiskUsed),
        });
    }

    if samples.is_empty() {
        return Err(ParseError::NoDataPoints);
    }

    debug!(samples = samples.len(), mem_total_mb, disk_total_gb, "parsed resource log");
    Ok(ResourceLog {
        samples,
        mem_total_mb,
        disk_total_gb,
    })
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Timestamp,
    Cpu,
    MemUsed,
    MemTotal,
    DiskUsed,
    DiskTotal,
}

/// Positions of the required columns, in `REQUIRED_COLUMNS` order
struct ColumnMap([usize; 6]);

impl ColumnMap {
    fn from_header(header: &csv::StringRecord) -> Result<Self> {
        let positions: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_ascii_lowercase(), i))
            .collect();

        let mut indices = [0usize; 6];
        let mut missing = Vec::new();
        for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
            match positions.get(name) {
                Some(&i) => *slot = i,
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self(indices))
        } else {
            Err(ParseError::MissingColumns { missing })
        }
    }

    fn field<'r>(&self, record: &'r csv::StringRecord, column: Column) -> &'r str {
        record.get(self.0[column as usize]).unwrap_or("")
    }

    fn number(&self, record: &csv::StringRecord, column: Column) -> f64 {
        self.field(record, column)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}
