// Interactive call tree
//
// Workflow → collapsible hierarchy of calls, scatter shards and nested
// sub-workflows. Nodes are stored in an arena owned by the CallTree; the
// parent link is a plain index used for breadcrumbs and reveal, never for
// ownership. Expand/collapse only flips a flag, the tree is never rebuilt.

mod builder;
mod node;

pub use builder::{aggregate_status, build_call_tree, TreeBuilder};
pub use node::{CallTree, NodeIndex, NodeType, TreeNode};
