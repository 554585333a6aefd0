//! Node records stored in a flow graph.
//!
//! A [`NodeRecord`] is one step of a service: a question, an answer option,
//! a content page, a portal, and so on. Its behaviour is selected by
//! [`NodeKind`]; everything else lives in the open `attributes` bag which the
//! engine does not interpret, apart from a handful of well-known keys
//! (templating flags, portal targets, the pay bypass flag).
//!
//! The serialized shape matches the stored flow documents:
//! `{"type": 100, "data": {...}, "edges": [...]}`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::NodeId;

/// Open key/value bag carried by every node.
pub type Attributes = IndexMap<String, Value>;

/// Attribute naming the flow an external portal points at.
pub const ATTR_FLOW_ID: &str = "flowId";
/// Attribute marking a node as editable by templated flows.
pub const ATTR_IS_TEMPLATED_NODE: &str = "isTemplatedNode";
/// Attribute carrying guidance for operators customising a templated node.
pub const ATTR_TEMPLATED_INSTRUCTIONS: &str = "templatedNodeInstructions";
/// Attribute marking the templated instructions as mandatory.
pub const ATTR_INSTRUCTIONS_REQUIRED: &str = "areTemplatedNodeInstructionsRequired";
/// Attribute that hides a pay node from applicants.
pub const ATTR_HIDE_PAY: &str = "hidePay";

/// Behavioural type of a node.
///
/// Kinds are open-ended numeric component codes; the constants below cover
/// the codes the engine itself reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKind(pub u16);

/// Component codes used by the product.
impl NodeKind {
    pub const RESULT: NodeKind = NodeKind(3);
    pub const NOTICE: NodeKind = NodeKind(8);
    pub const FIND_PROPERTY: NodeKind = NodeKind(9);
    pub const QUESTION: NodeKind = NodeKind(100);
    pub const CHECKLIST: NodeKind = NodeKind(105);
    pub const TEXT_INPUT: NodeKind = NodeKind(110);
    pub const FILE_UPLOAD_AND_LABEL: NodeKind = NodeKind(145);
    pub const ANSWER: NodeKind = NodeKind(200);
    pub const CONTENT: NodeKind = NodeKind(250);
    pub const INTERNAL_PORTAL: NodeKind = NodeKind(300);
    pub const EXTERNAL_PORTAL: NodeKind = NodeKind(310);
    pub const SECTION: NodeKind = NodeKind(360);
    pub const SET_VALUE: NodeKind = NodeKind(380);
    pub const PAY: NodeKind = NodeKind(400);
    pub const FILTER: NodeKind = NodeKind(500);
    pub const REVIEW: NodeKind = NodeKind(600);
    pub const SEND: NodeKind = NodeKind(650);
    pub const CONFIRMATION: NodeKind = NodeKind(725);

    /// Editor-facing component name. Portals use their user-facing names
    /// ("Folder", "Flow").
    pub fn name(&self) -> &'static str {
        match *self {
            NodeKind::RESULT => "Result",
            NodeKind::NOTICE => "Notice",
            NodeKind::FIND_PROPERTY => "FindProperty",
            NodeKind::QUESTION => "Question",
            NodeKind::CHECKLIST => "Checklist",
            NodeKind::TEXT_INPUT => "TextInput",
            NodeKind::FILE_UPLOAD_AND_LABEL => "FileUploadAndLabel",
            NodeKind::ANSWER => "Answer",
            NodeKind::CONTENT => "Content",
            NodeKind::INTERNAL_PORTAL => "Folder",
            NodeKind::EXTERNAL_PORTAL => "Flow",
            NodeKind::SECTION => "Section",
            NodeKind::SET_VALUE => "SetValue",
            NodeKind::PAY => "Pay",
            NodeKind::FILTER => "Filter",
            NodeKind::REVIEW => "Review",
            NodeKind::SEND => "Send",
            NodeKind::CONFIRMATION => "Confirmation",
            _ => "node",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker left on nodes imported from another flow during flattening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Flow the node was imported from.
    pub source_flow: String,
    /// Identifier the node had inside that flow.
    pub source_node: NodeId,
}

/// One node of a flow graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Behavioural discriminator. `_root` has none.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Kind-specific attribute bag.
    #[serde(rename = "data", default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: Attributes,
    /// Outgoing edges in display order.
    #[serde(rename = "edges", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    /// Set on nodes spliced in from another flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl NodeRecord {
    /// Creates a leaf node of the given kind with no attributes.
    pub fn new(kind: NodeKind) -> Self {
        NodeRecord {
            kind: Some(kind),
            ..NodeRecord::default()
        }
    }

    /// Builder: sets one attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder: replaces the children list.
    pub fn with_children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeId>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the attribute as a string slice when it is a JSON string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Returns `true` when the attribute is the JSON literal `true`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.attributes.get(key), Some(Value::Bool(true)))
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        self.kind == Some(kind)
    }

    pub fn is_section(&self) -> bool {
        self.is_kind(NodeKind::SECTION)
    }

    pub fn is_external_portal(&self) -> bool {
        self.is_kind(NodeKind::EXTERNAL_PORTAL)
    }

    /// Flow referenced by an external portal node.
    pub fn portal_target(&self) -> Option<&str> {
        if self.is_external_portal() {
            self.attr_str(ATTR_FLOW_ID)
        } else {
            None
        }
    }

    pub fn is_templated(&self) -> bool {
        self.flag(ATTR_IS_TEMPLATED_NODE)
    }

    /// Best human-readable label for change summaries.
    pub fn label(&self) -> Option<String> {
        ["title", "text", "content", "fn", "val", ATTR_FLOW_ID]
            .iter()
            .find_map(|key| match self.attributes.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Display name of this node's kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind.map_or("node", |k| k.name())
    }
}

/// A node together with a nested tree of new children.
///
/// Used to insert several fresh nodes in one change (paste) and produced by
/// [`FlowGraph::subtree`](crate::graph::FlowGraph::subtree) when copying.
/// The `node.children` list is ignored on insertion; edges come from
/// `children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    pub id: NodeId,
    pub node: NodeRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeTree>,
}

impl NodeTree {
    pub fn leaf(id: impl Into<NodeId>, node: NodeRecord) -> Self {
        NodeTree {
            id: id.into(),
            node,
            children: Vec::new(),
        }
    }

    /// Returns every id in the tree, pre-order.
    pub fn ids(&self) -> Vec<&NodeId> {
        let mut out = vec![&self.id];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }

    /// Re-labels every node with an id produced by `next_id`, keeping shape
    /// and content.
    pub fn with_fresh_ids(mut self, next_id: &mut dyn FnMut() -> NodeId) -> Self {
        self.id = next_id();
        self.children = self
            .children
            .into_iter()
            .map(|child| child.with_fresh_ids(next_id))
            .collect();
        self
    }
}
