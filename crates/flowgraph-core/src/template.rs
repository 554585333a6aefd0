//! Operator edits to a templated flow.
//!
//! A templated flow is derived from a source template. Operators may only
//! customise it through partial overrides, keyed by node id, which are kept
//! apart from the template so they can be replayed whenever the template is
//! republished. Nodes that exist only in the edit set (new content added
//! inside an editable folder) carry their own `kind`.
//!
//! Stored shape: `{"Question": {"data": {"text": "..."}}, "Folder": {"edges": []}}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::node::{Attributes, NodeKind, NodeRecord};

/// Partial override of one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeOverride {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Merged key by key over the template's attributes.
    #[serde(rename = "data", default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: Attributes,
    /// Replaces the template's children outright when present. `Some(vec![])`
    /// empties the node.
    #[serde(rename = "edges", default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeId>>,
}

impl NodeOverride {
    /// Applies this override on top of `base`.
    pub fn apply_to(&self, base: &NodeRecord) -> NodeRecord {
        let mut merged = base.clone();
        if let Some(kind) = self.kind {
            merged.kind = Some(kind);
        }
        for (key, value) in &self.attributes {
            merged.attributes.insert(key.clone(), value.clone());
        }
        if let Some(children) = &self.children {
            merged.children = children.clone();
        }
        merged
    }

    /// Record for a node that exists only in the edit set.
    pub fn to_record(&self) -> NodeRecord {
        self.apply_to(&NodeRecord::default())
    }
}

/// Edit set of one templated flow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplatedEdits {
    overrides: IndexMap<NodeId, NodeOverride>,
}

impl TemplatedEdits {
    pub fn new() -> Self {
        TemplatedEdits::default()
    }

    pub fn insert(&mut self, id: impl Into<NodeId>, edit: NodeOverride) -> Option<NodeOverride> {
        self.overrides.insert(id.into(), edit)
    }

    pub fn get(&self, id: &str) -> Option<&NodeOverride> {
        self.overrides.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NodeOverride)> {
        self.overrides.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Rejects overrides whose children name a node that is neither in
    /// `template` nor in this edit set.
    pub fn check_references(&self, template: &FlowGraph) -> Result<(), GraphError> {
        for (id, edit) in &self.overrides {
            for child in edit.children.iter().flatten() {
                if !template.contains(child.as_str()) && !self.overrides.contains_key(child) {
                    return Err(GraphError::DanglingReference {
                        parent: id.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<(NodeId, NodeOverride)> for TemplatedEdits {
    fn from_iter<I: IntoIterator<Item = (NodeId, NodeOverride)>>(iter: I) -> Self {
        TemplatedEdits {
            overrides: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_stored_shape() {
        let edits: TemplatedEdits = serde_json::from_value(json!({
            "Question": {"data": {"text": "Which way??"}},
            "Folder": {"edges": []},
            "New": {"type": 250, "data": {"content": "NEW !"}}
        }))
        .unwrap();
        assert_eq!(edits.len(), 3);
        assert_eq!(edits.get("Folder").unwrap().children, Some(vec![]));
        assert_eq!(edits.get("Question").unwrap().children, None);
        assert_eq!(edits.get("New").unwrap().kind, Some(NodeKind::CONTENT));
    }

    #[test]
    fn override_merges_key_by_key() {
        let base = NodeRecord::new(NodeKind::QUESTION)
            .with_attr("text", "Which way?")
            .with_attr("isTemplatedNode", true)
            .with_children(["a", "b"]);
        let edit = NodeOverride {
            attributes: [("text".to_string(), json!("Which way??"))].into_iter().collect(),
            ..NodeOverride::default()
        };
        let merged = edit.apply_to(&base);
        assert_eq!(merged.attr_str("text"), Some("Which way??"));
        assert!(merged.is_templated());
        assert_eq!(merged.children, base.children);
    }

    #[test]
    fn references_may_point_into_the_edit_set() {
        let template = FlowGraph::from_json(json!({
            "_root": {"edges": ["Folder"]},
            "Folder": {"type": 300, "edges": ["Content"]},
            "Content": {"type": 250}
        }))
        .unwrap();
        let mut edits = TemplatedEdits::new();
        edits.insert(
            "Folder",
            NodeOverride {
                children: Some(vec!["Content".into(), "Extra".into()]),
                ..NodeOverride::default()
            },
        );
        assert!(edits.check_references(&template).is_err());

        edits.insert("Extra", NodeOverride { kind: Some(NodeKind::CONTENT), ..NodeOverride::default() });
        assert!(edits.check_references(&template).is_ok());
    }
}
