// Raw metadata document → typed Workflow
//
// Only a document that is not JSON, or whose top level is not an object, is
// rejected. Every individual field is read through DocView and degrades to a
// zero value when absent or malformed.

use crate::config::NormalizerConfig;
use crate::document::{json_type_name, DocView};
use crate::error::{ParseError, Result};
use crate::metadata::model::{
    Call, CallResources, ExecutionStatus, Failure, Workflow, WorkflowStatus, MAX_FAILURE_DEPTH,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace, warn};

/// Fallback timestamp layout: ISO-8601 without a timezone (taken as UTC)
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Normalize a raw metadata document with default settings
///
/// # Errors
/// Returns [`ParseError`] when the bytes are not JSON or the top level is not
/// an object. Missing or malformed fields never fail.
///
/// # Example
/// ```
/// use runlens::metadata::{normalize, WorkflowStatus};
///
/// let raw = br#"{
///     "id": "wf-1",
///     "workflowName": "main",
///     "status": "Succeeded",
///     "calls": {
///         "main.hello": [{"shardIndex": -1, "attempt": 1, "executionStatus": "Done"}]
///     }
/// }"#;
///
/// let workflow = normalize(raw).unwrap();
/// assert_eq!(workflow.status, WorkflowStatus::Succeeded);
/// assert_eq!(workflow.calls["main.hello"].len(), 1);
/// ```
pub fn normalize(raw: &[u8]) -> Result<Workflow> {
    normalize_with_config(raw, &NormalizerConfig::default())
}

/// Normalize a raw metadata document
pub fn normalize_with_config(raw: &[u8], config: &NormalizerConfig) -> Result<Workflow> {
    let value: Value = serde_json::from_slice(raw)?;
    normalize_value(&value, config)
}

/// Normalize an already-decoded JSON document
pub fn normalize_value(value: &Value, config: &NormalizerConfig) -> Result<Workflow> {
    if !value.is_object() {
        return Err(ParseError::NotAnObject {
            found: json_type_name(value),
        });
    }
    let workflow = Normalizer { config }.workflow(DocView::new(value), 0);
    debug!(
        workflow_id = %workflow.id,
        call_names = workflow.calls.len(),
        attempts = workflow.attempt_count(),
        "normalized workflow metadata"
    );
    Ok(workflow)
}

/// Parse an engine timestamp
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00.123Z`) and, as a fallback, the same
/// layout without a timezone. Returns `None` for empty or unparseable input.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(s, NAIVE_TIMESTAMP_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            debug!(timestamp = s, "unparseable timestamp, treating as absent");
            None
        }
    }
}

/// Parse a failure list into failure trees
pub fn parse_failures(doc: DocView<'_>) -> Vec<Failure> {
    doc.items().map(|f| parse_failure(f, 0)).collect()
}

fn parse_failure(doc: DocView<'_>, depth: usize) -> Failure {
    // Older engine versions emit bare strings instead of objects
    if !doc.is_object() {
        return Failure::new(doc.as_string());
    }
    let caused_by = if depth + 1 >= MAX_FAILURE_DEPTH {
        Vec::new()
    } else {
        doc.get("causedBy")
            .items()
            .map(|cause| parse_failure(cause, depth + 1))
            .collect()
    };
    Failure {
        message: doc.str("message"),
        caused_by,
    }
}

struct Normalizer<'c> {
    config: &'c NormalizerConfig,
}

impl Normalizer<'_> {
    fn workflow(&self, doc: DocView<'_>, depth: usize) -> Workflow {
        let mut workflow = Workflow {
            id: doc.str("id"),
            name: doc.str("workflowName"),
            status: WorkflowStatus::parse(&doc.str("status")),
            submission: parse_timestamp(&doc.str("submission")),
            start: parse_timestamp(&doc.str("start")),
            end: parse_timestamp(&doc.str("end")),
            labels: doc.get("labels").string_map().into_iter().collect(),
            inputs: doc.get("inputs").to_value(),
            outputs: doc.get("outputs").to_value(),
            failures: parse_failures(doc.get("failures")),
            workflow_root: doc.opt_str("workflowRoot"),
            parent_workflow_id: doc.opt_str("parentWorkflowId"),
            root_workflow_id: doc.opt_str("rootWorkflowId"),
            ..Workflow::default()
        };

        if workflow.status == WorkflowStatus::Unknown && !doc.str("status").is_empty() {
            warn!(status = %doc.str("status"), "unrecognized workflow status");
        }

        for (name, attempts) in doc.get("calls").entries() {
            let calls: Vec<Call> = attempts
                .items()
                .filter(|entry| entry.is_object())
                .map(|entry| self.call(name, entry, depth))
                .collect();
            trace!(call = name, attempts = calls.len(), "normalized call");
            workflow.calls.insert(name.to_string(), calls);
        }

        workflow
    }

    fn call(&self, name: &str, doc: DocView<'_>, depth: usize) -> Call {
        let runtime = doc.get("runtimeAttributes");
        let attempt = doc.i64_or("attempt", 1).clamp(1, i64::from(u32::MAX)) as u32;

        let mut call = Call {
            name: name.to_string(),
            shard_index: doc.i64_or("shardIndex", -1).max(-1),
            attempt,
            status: ExecutionStatus::parse(&doc.str("executionStatus")),
            start: parse_timestamp(&doc.str("start")),
            end: parse_timestamp(&doc.str("end")),
            backend: doc.str("backend"),
            return_code: doc.get("returnCode").as_i64(),
            resources: CallResources {
                cpu: runtime.str("cpu"),
                memory: runtime.str("memory"),
                preemptible: runtime.str("preemptible"),
                cost_per_hour: doc
                    .f64_or("vmCostPerHour", runtime.f64_or("vmCostPerHour", 0.0))
                    .max(0.0),
                docker: runtime.opt_str("docker"),
                disks: runtime.opt_str("disks"),
                zones: runtime.opt_str("zones"),
            },
            failures: parse_failures(doc.get("failures")),
            job_id: doc.opt_str("jobId"),
            call_root: doc.opt_str("callRoot"),
            stdout: doc.opt_str("stdout"),
            stderr: doc.opt_str("stderr"),
            command_line: doc.opt_str("commandLine"),
            cache_hit: doc.get("callCaching").get("hit").as_bool(),
            sub_workflow_id: doc.opt_str("subWorkflowId"),
            sub_workflow: None,
            inputs: doc.get("inputs").to_value(),
            outputs: doc.get("outputs").to_value(),
        };

        let nested = doc.get("subWorkflowMetadata");
        if nested.is_object() {
            if depth + 1 >= self.config.max_depth {
                warn!(
                    call = name,
                    max_depth = self.config.max_depth,
                    "sub-workflow nesting limit reached, dropping embedded metadata"
                );
            } else {
                let sub = self.workflow(nested, depth + 1);
                if !sub.id.is_empty() {
                    call.sub_workflow_id = Some(sub.id.clone());
                }
                call.sub_workflow = Some(Box::new(sub));
            }
        }

        call
    }
}
