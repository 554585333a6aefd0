//! Human-readable change summaries.
//!
//! Turns a patch list into one line per meaningful change, for history
//! panels and publish notes. `graph` is used to name nodes that a patch only
//! references by id; pass the graph the patches were applied to.

use std::collections::HashSet;

use serde_json::Value;

use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::node::NodeRecord;
use crate::patch::Patch;

/// Attributes short enough to quote old and new values in full.
const QUOTED_ATTRIBUTES: [&str; 4] = ["title", "text", "fn", "val"];

fn kind_name(record: Option<&NodeRecord>) -> &'static str {
    record.map_or("node", NodeRecord::kind_name)
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn titled(verb: &str, record: &NodeRecord) -> String {
    match record.label() {
        Some(label) => format!("{verb} {} \"{label}\"", record.kind_name()),
        None => format!("{verb} {}", record.kind_name()),
    }
}

/// Describes `patches` in order.
///
/// Edge patches for nodes created or deleted in the same list are folded
/// into the node's own line.
pub fn describe(graph: &FlowGraph, patches: &[Patch]) -> Vec<String> {
    let inserted: HashSet<&NodeId> = patches
        .iter()
        .filter_map(|p| match p {
            Patch::InsertNode { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    let deleted: HashSet<&NodeId> = patches
        .iter()
        .filter_map(|p| match p {
            Patch::DeleteNode { id, .. } => Some(id),
            _ => None,
        })
        .collect();

    let mut lines = Vec::new();
    for patch in patches {
        match patch {
            Patch::InsertNode { record, .. } if record.kind.is_some() => {
                lines.push(titled("Added", record));
            }
            Patch::DeleteNode { record, .. } if record.kind.is_some() => {
                lines.push(titled("Removed", record));
            }
            Patch::InsertNode { .. } | Patch::DeleteNode { .. } => {}
            Patch::SetAttribute { id, key, old, new } => {
                let name = kind_name(graph.get(id.as_str()));
                let quote = QUOTED_ATTRIBUTES.contains(&key.as_str());
                let line = match (old, new) {
                    (Some(old), Some(new)) if quote => format!(
                        "Updated {name} {key} from \"{}\" to \"{}\"",
                        quoted(old),
                        quoted(new)
                    ),
                    (Some(_), Some(_)) => format!("Updated {name} {key}"),
                    (None, Some(new)) if quote => {
                        format!("Added {name} {key} \"{}\"", quoted(new))
                    }
                    (None, Some(_)) => format!("Added {name} {key}"),
                    (Some(old), None) if quote => {
                        format!("Removed {name} {key} \"{}\"", quoted(old))
                    }
                    (Some(_), None) => format!("Removed {name} {key}"),
                    (None, None) => continue,
                };
                lines.push(line);
            }
            Patch::ReplaceChild { parent, .. } => {
                let line = if parent.is_root() {
                    "Re-ordered the root graph"
                } else {
                    "Moved node"
                };
                if lines.last().map(String::as_str) != Some(line) {
                    lines.push(line.to_string());
                }
            }
            Patch::InsertChild { parent, child, .. } => {
                if parent.is_root() || inserted.contains(child) {
                    continue;
                }
                lines.push(format!(
                    "Added {} to branch",
                    kind_name(graph.get(child.as_str()))
                ));
            }
            Patch::DeleteChild { parent, child, .. } => {
                if parent.is_root() || deleted.contains(child) {
                    continue;
                }
                lines.push(format!(
                    "Removed {} from branch",
                    kind_name(graph.get(child.as_str()))
                ));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::{MoveTarget, Position, RemoveTarget};
    use crate::node::{Attributes, NodeKind};
    use serde_json::json;

    fn checklist() -> FlowGraph {
        FlowGraph::from_json(json!({
            "_root": {"edges": ["list"]},
            "list": {"type": 105, "data": {"text": "Which fruits?"}, "edges": ["berry", "orange"]},
            "berry": {"type": 200, "data": {"text": "Blueberry"}},
            "orange": {"type": 200, "data": {"text": "Orange"}}
        }))
        .unwrap()
    }

    #[test]
    fn added_node_is_named_once() {
        let mut graph = checklist();
        let changes = graph
            .add(
                "list",
                Position::End,
                "banana",
                NodeRecord::new(NodeKind::ANSWER).with_attr("text", "Banana"),
            )
            .unwrap();
        assert_eq!(
            describe(&graph, &changes.forward),
            vec!["Added Answer \"Banana\""]
        );
    }

    #[test]
    fn attribute_changes() {
        let mut graph = checklist();
        let mut attrs = Attributes::new();
        attrs.insert("text".into(), json!("Which vegetables?"));
        attrs.insert("fn".into(), json!("fruit"));
        attrs.insert("allRequired".into(), json!(true));
        let changes = graph.update("list", attrs).unwrap();
        assert_eq!(
            describe(&graph, &changes.forward),
            vec![
                "Updated Checklist text from \"Which fruits?\" to \"Which vegetables?\"",
                "Added Checklist fn \"fruit\"",
                "Added Checklist allRequired",
            ]
        );
    }

    #[test]
    fn reorders_and_branch_moves() {
        let mut graph = checklist();
        let changes = graph
            .move_node("orange", "list", MoveTarget::Before("berry".into()))
            .unwrap();
        assert_eq!(describe(&graph, &changes.forward), vec!["Moved node"]);

        let changes = graph.remove("berry", RemoveTarget::Edge("list".into())).unwrap();
        assert_eq!(describe(&graph, &changes.forward), vec!["Removed Answer \"Blueberry\""]);
    }
}
