// Call tree storage and navigation
//
// Nodes live in one arena owned by CallTree. Parent → children edges own
// nothing either (indices into the arena); dropping the tree drops every node
// at once, and the parent index is only ever read for upward navigation.

use crate::metadata::Call;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// Handle to a node inside its [`CallTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeIndex(pub usize);

/// What a tree node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    Workflow,
    Call,
    SubWorkflow,
    /// Group of scatter shards (or retried attempts) of one call
    Shard,
}

/// One row of the interactive call tree
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode<'w> {
    /// Path-derived identifier, stable across rebuilds of the same workflow
    pub id: String,
    /// Display label
    pub name: String,
    pub node_type: NodeType,
    pub status: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub expanded: bool,
    pub children: Vec<NodeIndex>,
    /// Back-reference for upward navigation only
    pub parent: Option<NodeIndex>,
    /// Originating call attempt (None for workflow roots and shard groups)
    #[serde(skip)]
    pub call: Option<&'w Call>,
    pub depth: usize,
}

impl TreeNode<'_> {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn duration(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }
}

/// Hierarchical call tree with expand/collapse state
#[derive(Debug, Clone, Serialize)]
pub struct CallTree<'w> {
    nodes: Vec<TreeNode<'w>>,
    root: NodeIndex,
}

impl<'w> CallTree<'w> {
    pub(crate) fn from_nodes(nodes: Vec<TreeNode<'w>>, root: NodeIndex) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_node(&self) -> &TreeNode<'w> {
        &self.nodes[self.root.0]
    }

    pub fn get(&self, index: NodeIndex) -> Option<&TreeNode<'w>> {
        self.nodes.get(index.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in arena order (creation order, not display order)
    pub fn nodes(&self) -> &[TreeNode<'w>] {
        &self.nodes
    }

    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = &TreeNode<'w>> + '_ {
        self.get(index)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |c| self.get(*c))
    }

    /// Nodes currently visible, in display (pre-order) order
    ///
    /// A node is listed whenever its parent is listed and expanded; collapsed
    /// subtrees stay in the tree but are skipped.
    pub fn visible_nodes(&self) -> Vec<NodeIndex> {
        let mut visible = Vec::new();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let Some(node) = self.get(index) else {
                continue;
            };
            visible.push(index);
            if node.expanded {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        visible
    }

    /// Flip a node's expanded flag; returns the new state, `None` for a bad index
    pub fn toggle(&mut self, index: NodeIndex) -> Option<bool> {
        let node = self.nodes.get_mut(index.0)?;
        node.expanded = !node.expanded;
        Some(node.expanded)
    }

    pub fn expand(&mut self, index: NodeIndex) -> bool {
        self.set_expanded(index, true)
    }

    pub fn collapse(&mut self, index: NodeIndex) -> bool {
        self.set_expanded(index, false)
    }

    fn set_expanded(&mut self, index: NodeIndex, expanded: bool) -> bool {
        match self.nodes.get_mut(index.0) {
            Some(node) => {
                node.expanded = expanded;
                true
            }
            None => false,
        }
    }

    pub fn expand_all(&mut self) {
        for node in &mut self.nodes {
            node.expanded = true;
        }
    }

    /// Collapse every node except the root, leaving only top-level rows visible
    pub fn collapse_all(&mut self) {
        let root = self.root;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.expanded = i == root.0;
        }
    }

    /// Expand every ancestor of `index` so the node becomes visible
    pub fn reveal(&mut self, index: NodeIndex) {
        for ancestor in self.ancestors(index) {
            self.expand(ancestor);
        }
    }

    /// Ancestors of a node, root first, excluding the node itself
    pub fn ancestors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        let mut current = self.get(index).and_then(|n| n.parent);
        while let Some(parent) = current {
            // A malformed parent chain can't loop forever: depth is bounded by node count
            if path.len() > self.nodes.len() {
                break;
            }
            path.push(parent);
            current = self.get(parent).and_then(|n| n.parent);
        }
        path.reverse();
        path
    }

    /// Display names from the root down to (and including) the node
    pub fn breadcrumb(&self, index: NodeIndex) -> Vec<&str> {
        self.ancestors(index)
            .into_iter()
            .chain(std::iter::once(index))
            .filter_map(|i| self.get(i))
            .map(|n| n.name.as_str())
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id == id).map(NodeIndex)
    }

    /// Failed nodes in display order of a fully expanded tree
    pub fn failed_nodes(&self) -> Vec<NodeIndex> {
        let mut failed = Vec::new();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let Some(node) = self.get(index) else {
                continue;
            };
            if node.is_failed() {
                failed.push(index);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        failed
    }

    /// Indented text outline of the visible nodes
    ///
    /// `▾` marks an expanded node with children, `▸` a collapsed one.
    pub fn render_outline(&self) -> String {
        let mut out = String::new();
        for index in self.visible_nodes() {
            let Some(node) = self.get(index) else {
                continue;
            };
            let marker = match (node.has_children(), node.expanded) {
                (false, _) => ' ',
                (true, true) => '▾',
                (true, false) => '▸',
            };
            let _ = writeln!(
                out,
                "{}{} {} [{}]",
                "  ".repeat(node.depth),
                marker,
                node.name,
                node.status
            );
        }
        out
    }
}
