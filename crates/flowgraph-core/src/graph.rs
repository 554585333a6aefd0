//! FlowGraph: the canonical in-memory representation of one flow.
//!
//! A flow is stored as an arena: a flat map from [`NodeId`] to
//! [`NodeRecord`], where each record carries the ordered list of its
//! children. A node listed under several parents is a *clone*: the same
//! record is shared and every parent edge is independent.
//!
//! The reserved `_root` node always exists and owns the top-level order.
//!
//! Mutations live in [`crate::mutation`] and [`crate::patch`]; this module
//! only provides construction and read queries.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::GraphError;
use crate::id::{NodeId, ROOT_NODE_KEY};
use crate::node::{NodeRecord, NodeTree};

/// Raw node map in the stored document shape.
pub type NodeMap = IndexMap<NodeId, NodeRecord>;

/// One flow graph.
///
/// Equality ignores map insertion order: two graphs are equal when they hold
/// the same records under the same ids.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "NodeMap")]
pub struct FlowGraph {
    pub(crate) nodes: NodeMap,
}

impl Default for FlowGraph {
    fn default() -> Self {
        FlowGraph::new()
    }
}

impl From<NodeMap> for FlowGraph {
    fn from(nodes: NodeMap) -> Self {
        FlowGraph::from_nodes(nodes)
    }
}

impl Serialize for FlowGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.nodes.serialize(serializer)
    }
}

impl FlowGraph {
    /// Creates a graph holding only an empty `_root`.
    pub fn new() -> Self {
        let mut nodes = NodeMap::new();
        nodes.insert(NodeId::root(), NodeRecord::default());
        FlowGraph { nodes }
    }

    /// Builds a graph from a node map, adding an empty `_root` if missing.
    ///
    /// No invariants are checked; call [`FlowGraph::validate`] for that.
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, NodeRecord)>,
    {
        let mut nodes: NodeMap = nodes.into_iter().collect();
        if !nodes.contains_key(ROOT_NODE_KEY) {
            nodes.insert(NodeId::root(), NodeRecord::default());
        }
        FlowGraph { nodes }
    }

    /// Parses a graph from the stored JSON document shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encodes the graph in the stored JSON document shape.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.nodes)
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(id)
    }

    /// Returns the record or [`GraphError::NodeNotFound`].
    pub fn node(&self, id: &str) -> Result<&NodeRecord, GraphError> {
        self.nodes.get(id).ok_or_else(|| GraphError::NodeNotFound {
            id: NodeId::from(id),
        })
    }

    /// Ordered children of `id`. Unknown ids have no children.
    pub fn children(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|record| record.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` if `parent` lists `child` among its children.
    pub fn connects(&self, parent: &str, child: &str) -> bool {
        self.children(parent).iter().any(|c| c == child)
    }

    /// Every node that lists `id` as a child, in map order.
    pub fn parents_of(&self, id: &str) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|(_, record)| record.children.iter().any(|c| c == id))
            .map(|(parent, _)| parent)
            .collect()
    }

    /// Returns `true` if `id` hangs under more than one parent.
    pub fn is_clone(&self, id: &str) -> bool {
        self.nodes
            .values()
            .filter(|record| record.children.iter().any(|c| c == id))
            .take(2)
            .count()
            > 1
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeRecord)> {
        self.nodes.iter()
    }

    pub fn root(&self) -> Option<&NodeRecord> {
        self.nodes.get(ROOT_NODE_KEY)
    }

    pub fn into_nodes(self) -> NodeMap {
        self.nodes
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Pre-order depth-first walk from `start`, children in display order.
    ///
    /// Each node is reported once per traversal, so clones and cycles do not
    /// cause repeated visits. Dangling child ids are skipped.
    pub fn dfs(&self, start: &str) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let Some((start_id, _)) = self.nodes.get_key_value(start) else {
            return order;
        };
        let mut stack: Vec<&NodeId> = vec![start_id];

        while let Some(id) = stack.pop() {
            if !visited.insert(id.as_str()) {
                continue;
            }
            order.push(id.clone());
            for child in self.children(id.as_str()).iter().rev() {
                if self.contains(child.as_str()) && !visited.contains(child.as_str()) {
                    stack.push(child);
                }
            }
        }
        order
    }

    /// Sorts `ids` into root-to-leaf depth-first order.
    ///
    /// Ids not reachable from `_root` keep their relative input order and
    /// come last. Duplicates in the input are collapsed.
    pub fn sort_depth_first<'a, I>(&self, ids: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut wanted: Vec<&NodeId> = Vec::new();
        let mut seen = HashSet::new();
        for id in ids {
            if seen.insert(id.as_str()) {
                wanted.push(id);
            }
        }

        let rank: HashMap<NodeId, usize> = self
            .dfs(ROOT_NODE_KEY)
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let (mut reached, unreached): (Vec<&NodeId>, Vec<&NodeId>) =
            wanted.into_iter().partition(|id| rank.contains_key(*id));
        reached.sort_by_key(|id| rank[*id]);
        reached.into_iter().chain(unreached).cloned().collect()
    }

    /// Returns `true` if `to` is reachable from `from` by following child
    /// edges. A node reaches itself.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![from];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            for child in self.children(id) {
                if child == to {
                    return true;
                }
                stack.push(child.as_str());
            }
        }
        false
    }

    /// Every id reachable from `_root`, including `_root`.
    pub fn reachable(&self) -> HashSet<NodeId> {
        self.dfs(ROOT_NODE_KEY).into_iter().collect()
    }

    /// Ids present in the map but unreachable from `_root`, in map order.
    pub fn orphans(&self) -> Vec<NodeId> {
        let reachable = self.reachable();
        self.nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .cloned()
            .collect()
    }

    /// Hierarchical copy of `id` and its descendants.
    ///
    /// A child that would close a cycle back onto the current path is left
    /// out of the copy.
    pub fn subtree(&self, id: &str) -> Result<NodeTree, GraphError> {
        let mut path = Vec::new();
        self.subtree_inner(id, &mut path)
    }

    fn subtree_inner<'a>(
        &'a self,
        id: &'a str,
        path: &mut Vec<&'a str>,
    ) -> Result<NodeTree, GraphError> {
        let record = self.node(id)?;
        path.push(id);
        let mut children = Vec::with_capacity(record.children.len());
        for child in &record.children {
            if path.contains(&child.as_str()) || !self.contains(child.as_str()) {
                continue;
            }
            children.push(self.subtree_inner(child.as_str(), path)?);
        }
        path.pop();

        let mut node = record.clone();
        node.children = children.iter().map(|c| c.id.clone()).collect();
        Ok(NodeTree {
            id: NodeId::from(id),
            node,
            children,
        })
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    /// Directed view of the parent -> child edges for petgraph algorithms.
    fn edge_view(&self) -> DiGraphMap<&str, ()> {
        let mut view = DiGraphMap::new();
        for (id, record) in &self.nodes {
            view.add_node(id.as_str());
            for child in &record.children {
                view.add_edge(id.as_str(), child.as_str(), ());
            }
        }
        view
    }

    /// Returns `true` if no node can reach itself.
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.edge_view())
    }

    /// Some node that lies on a cycle, if any.
    pub fn find_cycle(&self) -> Option<NodeId> {
        match toposort(&self.edge_view(), None) {
            Ok(_) => None,
            Err(cycle) => Some(NodeId::from(cycle.node_id())),
        }
    }

    /// Checks every structural invariant and reports the first violation:
    /// dangling references, then section placement, then cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.check_references()?;
        self.check_sections()?;
        self.check_acyclic()
    }

    /// Every id named in a children list exists.
    pub fn check_references(&self) -> Result<(), GraphError> {
        for (parent, record) in &self.nodes {
            for child in &record.children {
                if !self.contains(child.as_str()) {
                    return Err(GraphError::DanglingReference {
                        parent: parent.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Sections hang directly off `_root`.
    pub fn check_sections(&self) -> Result<(), GraphError> {
        for (parent, record) in &self.nodes {
            if parent.is_root() {
                continue;
            }
            for child in &record.children {
                if self.get(child.as_str()).is_some_and(NodeRecord::is_section) {
                    return Err(GraphError::SectionPlacement {
                        id: child.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        match self.find_cycle() {
            Some(node) => Err(GraphError::CycleDetected { node }),
            None => Ok(()),
        }
    }
}
