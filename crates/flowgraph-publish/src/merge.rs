//! Template merge: re-applies a templated flow's edits over a new version
//! of its source template.

use serde::Serialize;

use flowgraph_core::node::ATTR_INSTRUCTIONS_REQUIRED;
use flowgraph_core::{FlowGraph, NodeId, NodeMap, TemplatedEdits};

/// Observations about a merged graph. Merging never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Nodes present in the merged map but unreachable from `_root`.
    pub orphans: Vec<NodeId>,
    /// Templated nodes whose instructions are required but which carry no
    /// operator edit.
    pub missing_required: Vec<NodeId>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty() && self.missing_required.is_empty()
    }
}

/// Merges `edits` over `template`.
///
/// Template nodes with an override get its attributes merged key by key,
/// and its children list (when present) in place of their own. Nodes that
/// exist only in the edit set are kept; they are linked only where some
/// override lists them as a child.
///
/// Callers are expected to run [`TemplatedEdits::check_references`] first.
pub fn merge(template: &FlowGraph, edits: &TemplatedEdits) -> (FlowGraph, MergeReport) {
    let mut nodes: NodeMap = template
        .iter()
        .map(|(id, record)| {
            let merged = match edits.get(id.as_str()) {
                Some(edit) => edit.apply_to(record),
                None => record.clone(),
            };
            (id.clone(), merged)
        })
        .collect();

    for (id, edit) in edits.iter() {
        if !template.contains(id.as_str()) {
            nodes.insert(id.clone(), edit.to_record());
        }
    }

    let merged = FlowGraph::from_nodes(nodes);
    let missing_required = template
        .iter()
        .filter(|(id, record)| {
            record.is_templated()
                && record.flag(ATTR_INSTRUCTIONS_REQUIRED)
                && edits.get(id.as_str()).is_none()
        })
        .map(|(id, _)| id.clone())
        .collect();
    let report = MergeReport {
        orphans: merged.orphans(),
        missing_required,
    };

    (merged, report)
}
