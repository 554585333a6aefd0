//! Publish-time diff between a flattened graph and the previous snapshot.

use std::collections::BTreeMap;

use serde::Serialize;

use flowgraph_core::node::ATTR_HIDE_PAY;
use flowgraph_core::{FlowGraph, NodeId, NodeKind, NodeRecord};
use flowgraph_storage::{hash_nodes, PublishFacts};

/// Node-level changes keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowDelta {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub modified: Vec<NodeId>,
}

impl FlowDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// One changed node as reported to the publisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlteredNode {
    pub id: NodeId,
    /// The node in the new graph; `None` when it was removed.
    #[serde(flatten)]
    pub record: Option<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// The new graph is identical to the previous snapshot.
    NoChanges,
    Changes {
        delta: FlowDelta,
        /// Added and modified nodes in root-to-leaf order, then removed ones.
        altered: Vec<AlteredNode>,
        facts: PublishFacts,
    },
}

impl DiffOutcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, DiffOutcome::NoChanges)
    }
}

/// Compares `next` against `previous` node by node.
///
/// Without a previous snapshot every node of `next` counts as added.
pub fn diff(previous: Option<&FlowGraph>, next: &FlowGraph) -> FlowDelta {
    let after: BTreeMap<NodeId, blake3::Hash> = hash_nodes(next);
    let before: BTreeMap<NodeId, blake3::Hash> = previous.map(hash_nodes).unwrap_or_default();

    let mut delta = FlowDelta::default();
    for (id, hash) in &after {
        match before.get(id) {
            None => delta.added.push(id.clone()),
            Some(old) if old != hash => delta.modified.push(id.clone()),
            Some(_) => {}
        }
    }
    delta.removed = before
        .keys()
        .filter(|id| !after.contains_key(*id))
        .cloned()
        .collect();
    delta
}

/// Side-effect facts of a flattened graph.
pub fn scan_facts(graph: &FlowGraph) -> PublishFacts {
    let mut facts = PublishFacts::default();
    for (id, record) in graph.iter() {
        if id.is_root() {
            continue;
        }
        match record.kind {
            Some(NodeKind::SEND) => facts.has_send_component = true,
            Some(NodeKind::SECTION) => facts.has_sections = true,
            Some(NodeKind::PAY) if !record.flag(ATTR_HIDE_PAY) => facts.has_pay_component = true,
            _ => {}
        }
    }
    facts
}

/// Full publish comparison: delta, ordered altered nodes and facts.
pub fn publish_diff(previous: Option<&FlowGraph>, next: &FlowGraph) -> DiffOutcome {
    let delta = diff(previous, next);
    if delta.is_empty() {
        return DiffOutcome::NoChanges;
    }

    let present = next.sort_depth_first(delta.added.iter().chain(&delta.modified));
    let altered = present
        .into_iter()
        .map(|id| AlteredNode {
            record: next.get(id.as_str()).cloned(),
            id,
        })
        .chain(delta.removed.iter().map(|id| AlteredNode {
            id: id.clone(),
            record: None,
        }))
        .collect();

    DiffOutcome::Changes {
        facts: scan_facts(next),
        delta,
        altered,
    }
}
