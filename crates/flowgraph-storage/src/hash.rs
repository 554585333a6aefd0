//! Deterministic content hashing for flow nodes using blake3.
//!
//! Hashes are derived state and never stored. They let the publish differ
//! compare two snapshots node by node without deep structural comparison.
//!
//! # Determinism
//!
//! Records are hashed through their JSON encoding. Converting to a
//! `serde_json::Value` first puts object keys in sorted order (serde_json's
//! `Map` is a `BTreeMap` without `preserve_order`), so attribute insertion
//! order never changes a hash. Arrays keep their order, since child order is
//! meaningful. Two records that compare equal always hash equal.

use std::collections::BTreeMap;

use flowgraph_core::{FlowGraph, NodeId, NodeRecord};

/// Compact JSON encoding of a node record with object keys sorted.
pub fn canonical_bytes(record: &NodeRecord) -> Vec<u8> {
    // NodeRecord only holds strings, numbers and maps keyed by strings.
    serde_json::to_value(record)
        .and_then(|value| serde_json::to_vec(&value))
        .unwrap_or_default()
}

/// Hash of one node's content: kind, attributes, children and provenance.
pub fn hash_node(record: &NodeRecord) -> blake3::Hash {
    blake3::hash(&canonical_bytes(record))
}

/// Per-node hashes of a whole graph, keyed by id in sorted order.
pub fn hash_nodes(graph: &FlowGraph) -> BTreeMap<NodeId, blake3::Hash> {
    graph
        .iter()
        .map(|(id, record)| (id.clone(), hash_node(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::NodeKind;
    use serde_json::json;

    #[test]
    fn attribute_order_does_not_matter() {
        let a = NodeRecord::new(NodeKind::QUESTION)
            .with_attr("text", "Which way?")
            .with_attr("fn", "direction");
        let b = NodeRecord::new(NodeKind::QUESTION)
            .with_attr("fn", "direction")
            .with_attr("text", "Which way?");
        assert_eq!(hash_node(&a), hash_node(&b));
    }

    #[test]
    fn child_order_matters() {
        let a = NodeRecord::new(NodeKind::QUESTION).with_children(["x", "y"]);
        let b = NodeRecord::new(NodeKind::QUESTION).with_children(["y", "x"]);
        assert_ne!(hash_node(&a), hash_node(&b));
    }

    #[test]
    fn graph_hashes_track_content() {
        let mut graph = FlowGraph::new();
        let empty = hash_nodes(&graph);
        assert_eq!(empty, hash_nodes(&FlowGraph::new()));
        graph
            .add("_root", flowgraph_core::Position::End, "n", NodeRecord::new(NodeKind::NOTICE))
            .unwrap();
        let after = hash_nodes(&graph);
        assert_eq!(after.len(), 2);
        assert_ne!(empty[&NodeId::root()], after[&NodeId::root()]);
    }

    #[test]
    fn canonical_encoding_is_compact_and_sorted() {
        let record = NodeRecord::new(NodeKind::CONTENT)
            .with_attr("z", json!({"b": 1, "a": [true, null]}))
            .with_attr("a", "x");
        let text = String::from_utf8(canonical_bytes(&record)).unwrap();
        assert_eq!(text, r#"{"data":{"a":"x","z":{"a":[true,null],"b":1}},"type":250}"#);
    }
}
