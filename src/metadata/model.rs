// Normalized execution model
//
// Workflow owns its calls; a Call owns its nested sub-workflow (if any) and
// its failure tree. Everything is plain data: analyzers only read it.

use crate::metadata::units::{parse_cpu, parse_max_preemptible, parse_memory_gb, preemptible_enabled};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Maximum failure nesting rendered by [`Failure::flatten`]
pub const MAX_FAILURE_DEPTH: usize = 32;

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum WorkflowStatus {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Aborted,
    Aborting,
    OnHold,
    #[default]
    Unknown,
}

impl WorkflowStatus {
    /// Parse a status string; anything unrecognized maps to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Self::Submitted,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "aborted" => Self::Aborted,
            "aborting" => Self::Aborting,
            "on hold" | "onhold" | "on_hold" => Self::OnHold,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Aborted => "Aborted",
            Self::Aborting => "Aborting",
            Self::OnHold => "On Hold",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the workflow can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a single call attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ExecutionStatus {
    #[default]
    NotStarted,
    WaitingForQueueSpace,
    QueuedInCromwell,
    Starting,
    Running,
    Aborting,
    Aborted,
    Failed,
    RetryableFailure,
    Preempted,
    Done,
    Bypassed,
    Unstartable,
    /// A status string this version does not know; kept verbatim
    Other(String),
}

impl ExecutionStatus {
    /// Parse a status string case-insensitively; unknown values are kept as `Other`
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "notstarted" => Self::NotStarted,
            "waitingforqueuespace" => Self::WaitingForQueueSpace,
            "queuedincromwell" => Self::QueuedInCromwell,
            "starting" => Self::Starting,
            "running" => Self::Running,
            "aborting" => Self::Aborting,
            "aborted" => Self::Aborted,
            "failed" => Self::Failed,
            "retryablefailure" => Self::RetryableFailure,
            "preempted" => Self::Preempted,
            "done" => Self::Done,
            "bypassed" => Self::Bypassed,
            "unstartable" => Self::Unstartable,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::WaitingForQueueSpace => "WaitingForQueueSpace",
            Self::QueuedInCromwell => "QueuedInCromwell",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Aborting => "Aborting",
            Self::Aborted => "Aborted",
            Self::Failed => "Failed",
            Self::RetryableFailure => "RetryableFailure",
            Self::Preempted => "Preempted",
            Self::Done => "Done",
            Self::Bypassed => "Bypassed",
            Self::Unstartable => "Unstartable",
            Self::Other(s) => s,
        }
    }

    /// Starting or running on a backend
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether this attempt will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done
                | Self::Failed
                | Self::Aborted
                | Self::Preempted
                | Self::RetryableFailure
                | Self::Bypassed
                | Self::Unstartable
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExecutionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A failure and the failures that caused it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Failure {
    pub message: String,
    pub caused_by: Vec<Failure>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            caused_by: Vec::new(),
        }
    }

    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.caused_by.push(cause);
        self
    }

    /// Render the failure tree as display lines, indented two spaces per level
    ///
    /// Causes nested deeper than [`MAX_FAILURE_DEPTH`] are summarized by a
    /// single marker line.
    pub fn flatten(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.flatten_into(0, &mut lines);
        lines
    }

    fn flatten_into(&self, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        if depth >= MAX_FAILURE_DEPTH {
            lines.push(format!("{}... (deeper causes omitted)", indent));
            return;
        }
        if !self.message.is_empty() {
            lines.push(format!("{}{}", indent, self.message));
        }
        let child_depth = if self.message.is_empty() { depth } else { depth + 1 };
        for cause in &self.caused_by {
            cause.flatten_into(child_depth, lines);
        }
    }

    /// Messages of the leaves of the failure tree (the root causes)
    pub fn root_causes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_root_causes(0, &mut out);
        out
    }

    fn collect_root_causes<'a>(&'a self, depth: usize, out: &mut Vec<&'a str>) {
        if self.caused_by.is_empty() || depth >= MAX_FAILURE_DEPTH {
            if !self.message.is_empty() {
                out.push(&self.message);
            }
            return;
        }
        for cause in &self.caused_by {
            cause.collect_root_causes(depth + 1, out);
        }
    }
}

/// Resource request of a call attempt, kept as the engine reported it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallResources {
    /// CPU request (free-form, e.g. "2")
    pub cpu: String,
    /// Memory request (free-form, e.g. "7.5 GB", "8192 MB")
    pub memory: String,
    /// Preemptible configuration ("", "false", "true", or a max attempt count)
    pub preemptible: String,
    /// Known hourly price of the VM, 0.0 when unknown
    pub cost_per_hour: f64,
    pub docker: Option<String>,
    pub disks: Option<String>,
    pub zones: Option<String>,
}

/// One attempt of one shard of a task
#[derive(Debug, Clone, Default, Serialize)]
pub struct Call {
    /// Fully-qualified call name
    pub name: String,
    /// Scatter index, -1 when not scattered
    pub shard_index: i64,
    /// Attempt number, starting at 1
    pub attempt: u32,
    pub status: ExecutionStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub backend: String,
    pub return_code: Option<i64>,
    pub resources: CallResources,
    pub failures: Vec<Failure>,
    pub job_id: Option<String>,
    pub call_root: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub command_line: Option<String>,
    pub cache_hit: Option<bool>,
    pub sub_workflow_id: Option<String>,
    /// Embedded metadata when this call invoked a sub-workflow
    pub sub_workflow: Option<Box<Workflow>>,
    pub inputs: serde_json::Value,
    pub outputs: serde_json::Value,
}

impl Call {
    /// Wall-clock duration; zero when either bound is missing or end precedes start
    pub fn duration(&self) -> Duration {
        span_duration(self.start, self.end)
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration().as_secs_f64() / 3600.0
    }

    pub fn cpu_count(&self) -> f64 {
        parse_cpu(&self.resources.cpu)
    }

    pub fn memory_gb(&self) -> f64 {
        parse_memory_gb(&self.resources.memory)
    }

    /// Whether this attempt was configured to run on preemptible capacity
    pub fn is_preemptible(&self) -> bool {
        preemptible_enabled(&self.resources.preemptible)
    }

    /// Preemptible attempt budget from the configuration string
    pub fn max_preemptible(&self) -> u32 {
        parse_max_preemptible(&self.resources.preemptible)
    }

    pub fn is_scattered(&self) -> bool {
        self.shard_index >= 0
    }

    pub fn is_sub_workflow(&self) -> bool {
        self.sub_workflow.is_some()
    }

    /// Short task name without the workflow prefix ("main.align" → "align")
    pub fn task_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// A workflow execution and everything it ran
#[derive(Debug, Clone, Default, Serialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub submission: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub inputs: serde_json::Value,
    pub outputs: serde_json::Value,
    pub failures: Vec<Failure>,
    /// Attempts per fully-qualified call name
    pub calls: BTreeMap<String, Vec<Call>>,
    pub workflow_root: Option<String>,
    pub parent_workflow_id: Option<String>,
    pub root_workflow_id: Option<String>,
}

impl Workflow {
    pub fn duration(&self) -> Duration {
        span_duration(self.start, self.end)
    }

    /// Total number of call attempts (not counting nested workflows)
    pub fn attempt_count(&self) -> usize {
        self.calls.values().map(Vec::len).sum()
    }

    /// The highest attempt of every (call name, shard) pair
    pub fn current_calls(&self) -> Vec<&Call> {
        let mut current = Vec::new();
        for attempts in self.calls.values() {
            let mut by_shard: BTreeMap<i64, &Call> = BTreeMap::new();
            for call in attempts {
                let slot = by_shard.entry(call.shard_index).or_insert(call);
                if call.attempt > slot.attempt {
                    *slot = call;
                }
            }
            current.extend(by_shard.into_values());
        }
        current
    }

    /// Merge nested sub-workflow calls into a single call map
    ///
    /// Nested names are prefixed with the invoking call's name and
    /// `separator`; a scattered invocation also carries its shard index
    /// (`main.per_sample[2]/sample.align`) so shards of different invocations
    /// are never merged. Invocations that carry embedded metadata are replaced
    /// by their nested calls; only the latest attempt per shard is followed.
    ///
    /// # Example
    /// ```
    /// use runlens::metadata::{Call, Workflow};
    ///
    /// let mut nested = Workflow::default();
    /// nested.calls.insert("sub.task".into(), vec![Call { attempt: 1, shard_index: -1, ..Call::default() }]);
    ///
    /// let mut root = Workflow::default();
    /// root.calls.insert(
    ///     "main.sub".into(),
    ///     vec![Call { attempt: 1, shard_index: -1, sub_workflow: Some(Box::new(nested)), ..Call::default() }],
    /// );
    ///
    /// let flat = root.flatten_calls("/");
    /// assert!(flat.contains_key("main.sub/sub.task"));
    /// assert!(!flat.contains_key("main.sub"));
    /// ```
    pub fn flatten_calls(&self, separator: &str) -> BTreeMap<String, Vec<Call>> {
        let mut flat = BTreeMap::new();
        self.flatten_into("", separator, &mut flat);
        flat
    }

    fn flatten_into(&self, prefix: &str, separator: &str, flat: &mut BTreeMap<String, Vec<Call>>) {
        for (name, attempts) in &self.calls {
            let qualified = format!("{}{}", prefix, name);

            let mut latest_invocations: BTreeMap<i64, &Call> = BTreeMap::new();
            for call in attempts {
                if call.sub_workflow.is_none() {
                    let mut copy = call.clone();
                    copy.name = qualified.clone();
                    flat.entry(qualified.clone()).or_insert_with(Vec::new).push(copy);
                    continue;
                }
                let slot = latest_invocations.entry(call.shard_index).or_insert(call);
                if call.attempt > slot.attempt {
                    *slot = call;
                }
            }

            for (shard, call) in latest_invocations {
                if let Some(nested) = &call.sub_workflow {
                    let nested_prefix = if shard >= 0 {
                        format!("{}[{}]{}", qualified, shard, separator)
                    } else {
                        format!("{}{}", qualified, separator)
                    };
                    nested.flatten_into(&nested_prefix, separator, flat);
                }
            }
        }
    }

    /// Every failure message in the workflow, its calls and nested workflows
    ///
    /// Call failures are prefixed with the call name, shard and attempt.
    pub fn all_failures(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.collect_failures(0, &mut lines);
        lines
    }

    fn collect_failures(&self, depth: usize, lines: &mut Vec<String>) {
        for failure in &self.failures {
            lines.extend(failure.flatten());
        }
        if depth >= MAX_FAILURE_DEPTH {
            return;
        }
        for (name, attempts) in &self.calls {
            for call in attempts {
                if !call.failures.is_empty() {
                    let shard = if call.is_scattered() {
                        format!(" [shard {}]", call.shard_index)
                    } else {
                        String::new()
                    };
                    lines.push(format!("{}{} (attempt {}):", name, shard, call.attempt));
                    for failure in &call.failures {
                        lines.extend(failure.flatten().into_iter().map(|l| format!("  {}", l)));
                    }
                }
                if let Some(nested) = &call.sub_workflow {
                    nested.collect_failures(depth + 1, lines);
                }
            }
        }
    }
}

fn span_duration(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Duration {
    match (start, end) {
        (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}
