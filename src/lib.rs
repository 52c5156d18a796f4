//! Runlens - workflow execution metadata analysis
//!
//! This library turns a workflow engine's metadata export into a typed model
//! and analyzes it: cost-weighted preemption efficiency, a collapsible call
//! tree for interactive debugging, and resource utilization from per-task
//! monitoring logs.
//!
//! ```
//! let raw = br#"{
//!     "id": "wf-1",
//!     "workflowName": "main",
//!     "status": "Succeeded",
//!     "calls": {
//!         "main.hello": [{"shardIndex": -1, "attempt": 1, "executionStatus": "Done"}]
//!     }
//! }"#;
//!
//! let workflow = runlens::metadata::normalize(raw).unwrap();
//! let summary = runlens::preemption::analyze_workflow(&workflow);
//! assert_eq!(summary.total_tasks, 1);
//!
//! let tree = runlens::call_tree::build_call_tree(&workflow);
//! assert_eq!(tree.visible_nodes().len(), 2);
//! ```

pub mod call_tree;
pub mod config;
pub mod document;
pub mod error;
pub mod metadata;
pub mod monitoring;
pub mod preemption;

pub use config::AnalyzerConfig;
pub use error::{ParseError, Result};
