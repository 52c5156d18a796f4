// Workflow → CallTree
//
// One node per call name: a plain Call/SubWorkflow node when the name has a
// single non-scattered attempt, otherwise a Shard group holding the latest
// attempt of each shard. Children are ordered by start time.

use crate::call_tree::node::{CallTree, NodeIndex, NodeType, TreeNode};
use crate::config::NormalizerConfig;
use crate::metadata::{Call, ExecutionStatus, Workflow};
use crate::preemption::group_by_shard;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Build a call tree with the root expanded and everything else collapsed
///
/// # Example
/// ```
/// use runlens::call_tree::{build_call_tree, NodeType};
/// use runlens::metadata::{Call, Workflow};
///
/// let mut workflow = Workflow { id: "wf-1".into(), ..Default::default() };
/// workflow.calls.insert(
///     "main.hello".into(),
///     vec![Call { name: "main.hello".into(), shard_index: -1, attempt: 1, ..Default::default() }],
/// );
///
/// let tree = build_call_tree(&workflow);
/// let children: Vec<_> = tree.children(tree.root()).collect();
/// assert_eq!(children.len(), 1);
/// assert_eq!(children[0].node_type, NodeType::Call);
/// ```
pub fn build_call_tree(workflow: &Workflow) -> CallTree<'_> {
    TreeBuilder::default().build(workflow)
}

/// Configurable call tree construction
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    expand_depth: usize,
    max_depth: usize,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            expand_depth: 0,
            max_depth: NormalizerConfig::default().max_depth,
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with every node at or above `depth` expanded (root is depth 0)
    pub fn expand_to_depth(mut self, depth: usize) -> Self {
        self.expand_depth = depth;
        self
    }

    /// Sub-workflow nesting levels followed, counted like the normalizer's limit
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn build<'w>(&self, workflow: &'w Workflow) -> CallTree<'w> {
        let root_id = if workflow.id.is_empty() {
            "workflow".to_string()
        } else {
            workflow.id.clone()
        };
        let root_name = if workflow.name.is_empty() {
            root_id.clone()
        } else {
            workflow.name.clone()
        };

        let mut nodes = vec![TreeNode {
            id: root_id,
            name: root_name,
            node_type: NodeType::Workflow,
            status: workflow.status.as_str().to_string(),
            start: workflow.start,
            end: workflow.end,
            expanded: true,
            children: Vec::new(),
            parent: None,
            call: None,
            depth: 0,
        }];

        self.add_calls(&mut nodes, NodeIndex(0), workflow, 1, 0);
        CallTree::from_nodes(nodes, NodeIndex(0))
    }

    fn push<'w>(&self, nodes: &mut Vec<TreeNode<'w>>, parent: NodeIndex, mut node: TreeNode<'w>) -> NodeIndex {
        let index = NodeIndex(nodes.len());
        node.parent = Some(parent);
        node.expanded = node.depth <= self.expand_depth;
        nodes.push(node);
        nodes[parent.0].children.push(index);
        index
    }

    fn add_calls<'w>(
        &self,
        nodes: &mut Vec<TreeNode<'w>>,
        parent: NodeIndex,
        workflow: &'w Workflow,
        depth: usize,
        nesting: usize,
    ) {
        // BTreeMap iteration gives lexicographic call names
        for (name, attempts) in &workflow.calls {
            match attempts.as_slice() {
                [] => {}
                [single] if single.shard_index == -1 => {
                    let id = format!("{}/{}", nodes[parent.0].id, name);
                    self.add_call_node(nodes, parent, id, name.clone(), single, depth, nesting);
                }
                _ => self.add_shard_group(nodes, parent, name, attempts, depth, nesting),
            }
        }
        sort_children_by_start(nodes, parent);
    }

    fn add_shard_group<'w>(
        &self,
        nodes: &mut Vec<TreeNode<'w>>,
        parent: NodeIndex,
        name: &str,
        attempts: &'w [Call],
        depth: usize,
        nesting: usize,
    ) {
        let group_id = format!("{}/{}", nodes[parent.0].id, name);
        let group = self.push(
            nodes,
            parent,
            TreeNode {
                id: group_id.clone(),
                name: name.to_string(),
                node_type: NodeType::Shard,
                status: aggregate_status(attempts),
                start: attempts.iter().filter_map(|c| c.start).min(),
                end: attempts.iter().filter_map(|c| c.end).max(),
                expanded: false,
                children: Vec::new(),
                parent: None,
                call: None,
                depth,
            },
        );

        for (shard, shard_attempts) in group_by_shard(attempts) {
            let Some(&latest) = shard_attempts.last() else {
                continue;
            };
            let mut label = if shard >= 0 {
                format!("{} [shard {}]", name, shard)
            } else {
                name.to_string()
            };
            if latest.attempt > 1 {
                label.push_str(&format!(" (attempt {})", latest.attempt));
            }
            let id = format!("{}[{}]", group_id, shard);
            self.add_call_node(nodes, group, id, label, latest, depth + 1, nesting);
        }
        sort_children_by_start(nodes, group);
    }

    #[allow(clippy::too_many_arguments)]
    fn add_call_node<'w>(
        &self,
        nodes: &mut Vec<TreeNode<'w>>,
        parent: NodeIndex,
        id: String,
        label: String,
        call: &'w Call,
        depth: usize,
        nesting: usize,
    ) {
        let node_type = if call.sub_workflow.is_some() {
            NodeType::SubWorkflow
        } else {
            NodeType::Call
        };
        let index = self.push(
            nodes,
            parent,
            TreeNode {
                id,
                name: label,
                node_type,
                status: call.status.as_str().to_string(),
                start: call.start,
                end: call.end,
                expanded: false,
                children: Vec::new(),
                parent: None,
                call: Some(call),
                depth,
            },
        );

        if let Some(nested) = &call.sub_workflow {
            // Shard groups add tree levels without adding nesting
            if nesting + 1 >= self.max_depth {
                warn!(call = %call.name, "call tree nesting limit reached, sub-workflow not expanded");
                return;
            }
            self.add_calls(nodes, index, nested, depth + 1, nesting + 1);
        }
    }
}

/// Aggregate status of a shard group
///
/// Any failed attempt fails the group; otherwise any active attempt makes it
/// running; all done makes it done; anything else reports the status of the
/// highest attempt.
pub fn aggregate_status(attempts: &[Call]) -> String {
    if attempts.iter().any(|c| c.status.is_failed()) {
        return ExecutionStatus::Failed.to_string();
    }
    if attempts.iter().any(|c| c.status.is_active()) {
        return ExecutionStatus::Running.to_string();
    }
    if !attempts.is_empty() && attempts.iter().all(|c| c.status == ExecutionStatus::Done) {
        return ExecutionStatus::Done.to_string();
    }
    attempts
        .iter()
        .max_by_key(|c| c.attempt)
        .map(|c| c.status.to_string())
        .unwrap_or_default()
}

/// Stable sort of a node's children by start time; untimed nodes go last
fn sort_children_by_start(nodes: &mut [TreeNode<'_>], parent: NodeIndex) {
    let mut keyed: Vec<(bool, Option<DateTime<Utc>>, NodeIndex)> = nodes[parent.0]
        .children
        .iter()
        .map(|&c| (nodes[c.0].start.is_none(), nodes[c.0].start, c))
        .collect();
    keyed.sort_by_key(|&(untimed, start, _)| (untimed, start));
    nodes[parent.0].children = keyed.into_iter().map(|(_, _, c)| c).collect();
}
