//! Structural mutations of a [`FlowGraph`].
//!
//! Every operation validates all of its preconditions before touching the
//! graph and reports the first violated one as a distinct [`GraphError`].
//! On success the graph has been changed and the returned [`ChangeSet`]
//! holds the forward patches that were applied plus the reverse list that
//! undoes them. On failure the graph is unchanged.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::node::{Attributes, NodeRecord, NodeTree};
use crate::patch::{ChangeSet, Patch};

/// Where a new edge goes in the parent's children list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Position {
    #[default]
    End,
    Before(NodeId),
}

/// Destination of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveTarget {
    /// Stay under the same parent, placed before this sibling.
    Before(NodeId),
    /// Go under `parent`, before `before` or at the end.
    To {
        parent: NodeId,
        before: Option<NodeId>,
    },
}

/// Which incoming edges a removal detaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveTarget {
    /// Only the edge from this parent. Other clones stay in place.
    Edge(NodeId),
    /// Every incoming edge.
    Everywhere,
}

/// Applies patches as they are produced so later steps see the updated
/// graph, and reverts them if a step fails.
struct Recorder<'g> {
    graph: &'g mut FlowGraph,
    forward: Vec<Patch>,
}

impl<'g> Recorder<'g> {
    fn push(&mut self, patch: Patch) -> Result<(), GraphError> {
        self.graph.apply_patch(&patch)?;
        self.forward.push(patch);
        Ok(())
    }

    fn rollback(self) {
        for patch in self.forward.iter().rev() {
            // Each patch here applied successfully, so its inverse applies
            // to the graph it produced.
            let reverted = self.graph.apply_patch(&patch.inverse());
            debug_assert!(reverted.is_ok(), "rollback failed: {reverted:?}");
        }
    }

    /// Removes the `parent -> child` edge.
    fn detach(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), GraphError> {
        let index = self
            .graph
            .children(parent.as_str())
            .iter()
            .position(|c| c == child)
            .ok_or_else(|| GraphError::NotConnected {
                parent: parent.clone(),
                child: child.clone(),
            })?;
        self.push(Patch::DeleteChild {
            parent: parent.clone(),
            index,
            child: child.clone(),
        })
    }

    /// Deletes `id`, then every child left without a parent.
    fn delete_cascade(&mut self, id: &NodeId) -> Result<(), GraphError> {
        let Some(record) = self.graph.get(id.as_str()).cloned() else {
            return Ok(());
        };
        self.push(Patch::DeleteNode {
            id: id.clone(),
            record: record.clone(),
        })?;
        for child in &record.children {
            if self.graph.contains(child.as_str()) && self.graph.parents_of(child.as_str()).is_empty()
            {
                self.delete_cascade(child)?;
            }
        }
        Ok(())
    }

    /// Rewrites `parent`'s children to `new` with positional patches:
    /// replacements for differing slots, then inserts or trailing deletes.
    fn set_children(&mut self, parent: &NodeId, new: &[NodeId]) -> Result<(), GraphError> {
        let old = self.graph.children(parent.as_str()).to_vec();
        for (index, (was, now)) in old.iter().zip(new).enumerate() {
            if was != now {
                self.push(Patch::ReplaceChild {
                    parent: parent.clone(),
                    index,
                    old: was.clone(),
                    new: now.clone(),
                })?;
            }
        }
        for (index, child) in new.iter().enumerate().skip(old.len()) {
            self.push(Patch::InsertChild {
                parent: parent.clone(),
                index,
                child: child.clone(),
            })?;
        }
        for index in (new.len()..old.len()).rev() {
            self.push(Patch::DeleteChild {
                parent: parent.clone(),
                index,
                child: old[index].clone(),
            })?;
        }
        Ok(())
    }

    /// Inserts a tree of new records, children before parents.
    fn insert_tree(&mut self, tree: &NodeTree) -> Result<(), GraphError> {
        for child in &tree.children {
            self.insert_tree(child)?;
        }
        let mut record = tree.node.clone();
        record.children = tree.children.iter().map(|c| c.id.clone()).collect();
        self.push(Patch::InsertNode {
            id: tree.id.clone(),
            record,
        })
    }
}

/// Strips zero-width characters and the `↵` marker, then trims.
fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|&c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '↵'))
        .collect();
    stripped.trim().to_string()
}

fn sanitize(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(clean_text(&text)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

/// Values that clear an attribute instead of setting it.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl FlowGraph {
    /// Runs `build` against a recorder, returning the change set or
    /// reverting everything it applied.
    fn record<F>(&mut self, build: F) -> Result<ChangeSet, GraphError>
    where
        F: FnOnce(&mut Recorder<'_>) -> Result<(), GraphError>,
    {
        let mut recorder = Recorder {
            graph: self,
            forward: Vec::new(),
        };
        match build(&mut recorder) {
            Ok(()) => Ok(ChangeSet::from_forward(recorder.forward)),
            Err(err) => {
                recorder.rollback();
                Err(err)
            }
        }
    }

    fn require_node(&self, id: &str) -> Result<NodeId, GraphError> {
        if self.contains(id) {
            Ok(NodeId::from(id))
        } else {
            Err(GraphError::NodeNotFound { id: id.into() })
        }
    }

    fn require_parent(&self, id: &str) -> Result<NodeId, GraphError> {
        if self.contains(id) {
            Ok(NodeId::from(id))
        } else {
            Err(GraphError::ParentNotFound { id: id.into() })
        }
    }

    /// Index at which `position` inserts under `parent`.
    fn insert_index(&self, parent: &NodeId, position: &Position) -> Result<usize, GraphError> {
        let children = self.children(parent.as_str());
        match position {
            Position::End => Ok(children.len()),
            Position::Before(sibling) => children
                .iter()
                .position(|c| c == sibling)
                .ok_or_else(|| GraphError::SiblingNotFound {
                    parent: parent.clone(),
                    sibling: sibling.clone(),
                }),
        }
    }

    fn check_section_parent(&self, id: &NodeId, parent: &NodeId) -> Result<(), GraphError> {
        let is_section = self.get(id.as_str()).is_some_and(NodeRecord::is_section);
        if is_section && !parent.is_root() {
            return Err(GraphError::SectionPlacement {
                id: id.clone(),
                parent: parent.clone(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Add
    // -----------------------------------------------------------------------

    /// Inserts `record` under `parent` at `position`.
    ///
    /// `record.children` may name existing nodes, which become clones.
    pub fn add(
        &mut self,
        parent: &str,
        position: Position,
        id: impl Into<NodeId>,
        record: NodeRecord,
    ) -> Result<ChangeSet, GraphError> {
        let id = id.into();
        let parent = self.require_parent(parent)?;
        if id.is_root() || self.contains(id.as_str()) {
            return Err(GraphError::DuplicateNode { id });
        }
        let index = self.insert_index(&parent, &position)?;

        let mut seen = HashSet::new();
        for child in &record.children {
            if !self.contains(child.as_str()) {
                return Err(GraphError::DanglingReference {
                    parent: id,
                    child: child.clone(),
                });
            }
            if !seen.insert(child) {
                return Err(GraphError::DuplicateEdge {
                    parent: id,
                    child: child.clone(),
                });
            }
        }

        if record.is_section() && !parent.is_root() {
            return Err(GraphError::SectionPlacement { id, parent });
        }
        for child in &record.children {
            self.check_section_parent(child, &id)?;
        }

        // An existing child that reaches `parent` would close a loop.
        if record
            .children
            .iter()
            .any(|child| self.has_path(child.as_str(), parent.as_str()))
        {
            return Err(GraphError::CycleDetected { node: id });
        }

        self.record(|rec| {
            rec.push(Patch::InsertNode {
                id: id.clone(),
                record,
            })?;
            rec.push(Patch::InsertChild {
                parent,
                index,
                child: id,
            })
        })
    }

    /// Inserts a whole tree of new nodes under `parent` in one change.
    ///
    /// Edges come from the tree's nesting; `tree.node.children` is ignored.
    pub fn add_tree(
        &mut self,
        parent: &str,
        position: Position,
        tree: &NodeTree,
    ) -> Result<ChangeSet, GraphError> {
        let parent = self.require_parent(parent)?;

        let mut seen = HashSet::new();
        for id in tree.ids() {
            if id.is_root() || self.contains(id.as_str()) || !seen.insert(id) {
                return Err(GraphError::DuplicateNode { id: id.clone() });
            }
        }
        let index = self.insert_index(&parent, &position)?;

        if tree.node.is_section() && !parent.is_root() {
            return Err(GraphError::SectionPlacement {
                id: tree.id.clone(),
                parent,
            });
        }
        check_nested_sections(tree)?;

        self.record(|rec| {
            rec.insert_tree(tree)?;
            rec.push(Patch::InsertChild {
                parent,
                index,
                child: tree.id.clone(),
            })
        })
    }

    /// Pastes a copied tree (see [`FlowGraph::subtree`]) under `parent`.
    ///
    /// Every node gets a fresh id from `next_id`, so the paste never clashes
    /// with the nodes it was copied from. Returns the change set and the id
    /// of the pasted top node.
    pub fn paste(
        &mut self,
        parent: &str,
        position: Position,
        tree: NodeTree,
        next_id: &mut dyn FnMut() -> NodeId,
    ) -> Result<(ChangeSet, NodeId), GraphError> {
        let tree = tree.with_fresh_ids(next_id);
        let changes = self.add_tree(parent, position, &tree)?;
        Ok((changes, tree.id))
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Detaches `id` from the parents selected by `target`.
    ///
    /// The record is deleted once its last incoming edge is gone, and the
    /// deletion cascades to children that thereby lose their last parent.
    pub fn remove(&mut self, id: &str, target: RemoveTarget) -> Result<ChangeSet, GraphError> {
        let id = self.require_node(id)?;
        if id.is_root() {
            return Err(GraphError::RootProtected);
        }
        let parents: Vec<NodeId> = match target {
            RemoveTarget::Edge(parent) => {
                if !self.contains(parent.as_str()) {
                    return Err(GraphError::ParentNotFound { id: parent });
                }
                if !self.connects(parent.as_str(), id.as_str()) {
                    return Err(GraphError::NotConnected { parent, child: id });
                }
                vec![parent]
            }
            RemoveTarget::Everywhere => self.parents_of(id.as_str()).into_iter().cloned().collect(),
        };

        self.record(|rec| {
            for parent in &parents {
                rec.detach(parent, &id)?;
            }
            if rec.graph.parents_of(id.as_str()).is_empty() {
                rec.delete_cascade(&id)?;
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Move
    // -----------------------------------------------------------------------

    /// Moves the `from_parent -> id` edge to `target`.
    ///
    /// Moving a node before itself is a no-op and yields an empty change set.
    pub fn move_node(
        &mut self,
        id: &str,
        from_parent: &str,
        target: MoveTarget,
    ) -> Result<ChangeSet, GraphError> {
        let id = self.require_node(id)?;
        let from = self.require_parent(from_parent)?;
        if !self.connects(from.as_str(), id.as_str()) {
            return Err(GraphError::NotConnected {
                parent: from,
                child: id,
            });
        }

        let (dest, before) = match target {
            MoveTarget::Before(sibling) => (from.clone(), Some(sibling)),
            MoveTarget::To { parent, before } => (parent, before),
        };

        if dest == from {
            return self.reorder(&from, &id, before);
        }

        if !self.contains(dest.as_str()) {
            return Err(GraphError::DestinationNotFound { id: dest });
        }
        let position = before.map_or(Position::End, Position::Before);
        let index = self.insert_index(&dest, &position)?;
        if self.connects(dest.as_str(), id.as_str()) {
            return Err(GraphError::DuplicateEdge {
                parent: dest,
                child: id,
            });
        }
        if self.has_path(id.as_str(), dest.as_str()) {
            return Err(GraphError::CycleDetected { node: id });
        }
        self.check_section_parent(&id, &dest)?;

        self.record(|rec| {
            rec.detach(&from, &id)?;
            rec.push(Patch::InsertChild {
                parent: dest,
                index,
                child: id,
            })
        })
    }

    /// Same-parent move: reorders `parent`'s children.
    fn reorder(
        &mut self,
        parent: &NodeId,
        id: &NodeId,
        before: Option<NodeId>,
    ) -> Result<ChangeSet, GraphError> {
        let children = self.children(parent.as_str()).to_vec();
        if let Some(sibling) = &before {
            if !children.contains(sibling) {
                return Err(GraphError::SiblingNotFound {
                    parent: parent.clone(),
                    sibling: sibling.clone(),
                });
            }
            if sibling == id {
                return Ok(ChangeSet::default());
            }
        }

        let mut reordered: Vec<NodeId> = children.iter().filter(|c| *c != id).cloned().collect();
        let index = before
            .as_ref()
            .and_then(|sibling| reordered.iter().position(|c| c == sibling))
            .unwrap_or(reordered.len());
        reordered.insert(index, id.clone());

        self.record(|rec| rec.set_children(parent, &reordered))
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Adds a `parent -> child` edge to an existing node.
    pub fn connect(
        &mut self,
        parent: &str,
        child: &str,
        position: Position,
    ) -> Result<ChangeSet, GraphError> {
        self.link(parent, child, position, false)
    }

    /// Attaches an existing node under another parent, making it a clone.
    ///
    /// Sections and external portals cannot be cloned.
    pub fn clone_node(
        &mut self,
        id: &str,
        to_parent: &str,
        position: Position,
    ) -> Result<ChangeSet, GraphError> {
        self.link(to_parent, id, position, true)
    }

    fn link(
        &mut self,
        parent: &str,
        child: &str,
        position: Position,
        as_clone: bool,
    ) -> Result<ChangeSet, GraphError> {
        let child = self.require_node(child)?;
        let parent = self.require_parent(parent)?;
        let index = self.insert_index(&parent, &position)?;
        if self.connects(parent.as_str(), child.as_str()) {
            return Err(GraphError::DuplicateEdge { parent, child });
        }
        if as_clone {
            let record = self.node(child.as_str())?;
            let reason = if record.is_section() {
                Some("sections cannot be cloned")
            } else if record.is_external_portal() {
                Some("external portals cannot be cloned")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(GraphError::CloneRestricted {
                    id: child,
                    reason: reason.to_string(),
                });
            }
        }
        if self.has_path(child.as_str(), parent.as_str()) {
            return Err(GraphError::CycleDetected { node: child });
        }
        self.check_section_parent(&child, &parent)?;

        self.record(|rec| {
            rec.push(Patch::InsertChild {
                parent,
                index,
                child,
            })
        })
    }

    /// Removes the `parent -> child` edge without deleting any record.
    pub fn disconnect(&mut self, parent: &str, child: &str) -> Result<ChangeSet, GraphError> {
        let parent = self.require_parent(parent)?;
        let child = self.require_node(child)?;
        if !self.connects(parent.as_str(), child.as_str()) {
            return Err(GraphError::NotConnected { parent, child });
        }
        self.record(|rec| rec.detach(&parent, &child))
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// Sets or clears attributes of `id`.
    ///
    /// Strings are sanitised (zero-width characters stripped, trimmed).
    /// `null`, empty strings, empty arrays and empty objects clear the key.
    /// Keys not named in `changes` are left alone.
    pub fn update(&mut self, id: &str, changes: Attributes) -> Result<ChangeSet, GraphError> {
        let id = self.require_node(id)?;
        let record = self.node(id.as_str())?;

        let mut patches = Vec::new();
        for (key, value) in changes {
            let value = sanitize(value);
            let new = if is_blank(&value) { None } else { Some(value) };
            let old = record.attributes.get(&key).cloned();
            if old != new {
                patches.push(Patch::SetAttribute {
                    id: id.clone(),
                    key,
                    old,
                    new,
                });
            }
        }

        self.record(|rec| {
            for patch in patches {
                rec.push(patch)?;
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Make unique
    // -----------------------------------------------------------------------

    /// Replaces the `parent -> id` clone edge with a deep copy of `id`.
    ///
    /// Descendants are copied under ids from `next_id`, except descendants
    /// that are themselves clones, which the copy links to. Returns the
    /// change set and the id of the copy.
    pub fn make_unique(
        &mut self,
        id: &str,
        parent: &str,
        next_id: &mut dyn FnMut() -> NodeId,
    ) -> Result<(ChangeSet, NodeId), GraphError> {
        let id = self.require_node(id)?;
        let parent = self.require_parent(parent)?;
        let index = self
            .children(parent.as_str())
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| GraphError::NotConnected {
                parent: parent.clone(),
                child: id.clone(),
            })?;

        let mut copies = Vec::new();
        let mut path = Vec::new();
        let copy_id = self.copy_unique(&id, next_id, &mut path, &mut copies)?;

        let new_id = copy_id.clone();
        let changes = self.record(|rec| {
            for (copy, record) in copies {
                rec.push(Patch::InsertNode { id: copy, record })?;
            }
            rec.push(Patch::InsertChild {
                parent: parent.clone(),
                index,
                child: copy_id,
            })?;
            rec.push(Patch::DeleteChild {
                parent,
                index: index + 1,
                child: id.clone(),
            })?;
            if rec.graph.parents_of(id.as_str()).is_empty() {
                rec.delete_cascade(&id)?;
            }
            Ok(())
        })?;
        Ok((changes, new_id))
    }

    /// Collects fresh copies of `id` and its unshared descendants,
    /// children before parents.
    fn copy_unique(
        &self,
        id: &NodeId,
        next_id: &mut dyn FnMut() -> NodeId,
        path: &mut Vec<NodeId>,
        out: &mut Vec<(NodeId, NodeRecord)>,
    ) -> Result<NodeId, GraphError> {
        let fresh = next_id();
        if fresh.is_root()
            || self.contains(fresh.as_str())
            || out.iter().any(|(taken, _)| *taken == fresh)
        {
            return Err(GraphError::DuplicateNode { id: fresh });
        }

        let mut record = self.node(id.as_str())?.clone();
        path.push(id.clone());
        let mut children = Vec::with_capacity(record.children.len());
        for child in &record.children {
            let shared = self.is_clone(child.as_str())
                || path.contains(child)
                || !self.contains(child.as_str());
            if shared {
                children.push(child.clone());
            } else {
                children.push(self.copy_unique(child, next_id, path, out)?);
            }
        }
        path.pop();

        record.children = children;
        out.push((fresh.clone(), record));
        Ok(fresh)
    }
}

/// Sections nested anywhere inside a tree are misplaced.
fn check_nested_sections(tree: &NodeTree) -> Result<(), GraphError> {
    for child in &tree.children {
        if child.node.is_section() {
            return Err(GraphError::SectionPlacement {
                id: child.id.clone(),
                parent: tree.id.clone(),
            });
        }
        check_nested_sections(child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::node::NodeKind;
    use serde_json::json;

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|id| NodeId::from(*id)).collect()
    }

    /// _root -> [q, end]; q -> [a1, a2]; a1 -> [info]; a2 -> [info].
    fn sample() -> FlowGraph {
        FlowGraph::from_json(json!({
            "_root": {"edges": ["q", "end"]},
            "q": {"type": 100, "data": {"text": "Pick"}, "edges": ["a1", "a2"]},
            "a1": {"type": 200, "data": {"text": "One"}, "edges": ["info"]},
            "a2": {"type": 200, "data": {"text": "Two"}, "edges": ["info"]},
            "info": {"type": 250, "data": {"content": "Shared"}},
            "end": {"type": 8}
        }))
        .unwrap()
    }

    fn undo(graph: &mut FlowGraph, changes: &ChangeSet) {
        graph.apply_patches(&changes.reverse).unwrap();
    }

    #[test]
    fn add_at_end_and_before_sibling() {
        let mut graph = sample();
        graph
            .add("_root", Position::End, "x", NodeRecord::new(NodeKind::CONTENT))
            .unwrap();
        graph
            .add(
                "_root",
                Position::Before("end".into()),
                "y",
                NodeRecord::new(NodeKind::CONTENT),
            )
            .unwrap();
        assert_eq!(graph.children("_root"), ids(&["q", "y", "end", "x"]));
    }

    #[test]
    fn add_validation_order() {
        let mut graph = sample();
        let node = || NodeRecord::new(NodeKind::CONTENT);

        let err = graph.add("nope", Position::End, "q", node()).unwrap_err();
        assert!(matches!(err, GraphError::ParentNotFound { .. }));

        let err = graph
            .add("_root", Position::Before("ghost".into()), "q", node())
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode { .. }));

        let err = graph
            .add("_root", Position::Before("a1".into()), "new", node())
            .unwrap_err();
        assert!(matches!(err, GraphError::SiblingNotFound { .. }));

        let err = graph
            .add("_root", Position::End, "new", node().with_children(["ghost"]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DanglingReference);

        let err = graph
            .add("q", Position::End, "s", NodeRecord::new(NodeKind::SECTION))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralConstraintViolation);

        assert_eq!(graph, sample());
    }

    #[test]
    fn add_rejects_loops_through_existing_children() {
        let mut graph = sample();
        let err = graph
            .add("info", Position::End, "loop", NodeRecord::default().with_children(["q"]))
            .unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
        assert_eq!(graph, sample());
    }

    #[test]
    fn add_tree_inserts_nested_nodes() {
        let mut graph = sample();
        let tree = NodeTree {
            id: "q2".into(),
            node: NodeRecord::new(NodeKind::QUESTION),
            children: vec![
                NodeTree::leaf("y", NodeRecord::new(NodeKind::ANSWER)),
                NodeTree::leaf("n", NodeRecord::new(NodeKind::ANSWER)),
            ],
        };
        let changes = graph.add_tree("_root", Position::End, &tree).unwrap();
        assert_eq!(graph.children("q2"), ids(&["y", "n"]));
        assert!(graph.validate().is_ok());
        undo(&mut graph, &changes);
        assert_eq!(graph, sample());

        let clash = NodeTree::leaf("a1", NodeRecord::new(NodeKind::ANSWER));
        assert!(matches!(
            graph.add_tree("_root", Position::End, &clash),
            Err(GraphError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn paste_copies_under_fresh_ids() {
        let mut graph = sample();
        let copied = graph.subtree("a1").unwrap();

        let mut n = 0;
        let mut next = || {
            n += 1;
            NodeId::new(format!("p{n}"))
        };
        let (changes, top) = graph
            .paste("_root", Position::Before("end".into()), copied, &mut next)
            .unwrap();

        assert_eq!(top, "p1");
        assert_eq!(graph.children("_root"), ids(&["q", "p1", "end"]));
        assert_eq!(graph.children("p1"), ids(&["p2"]));
        assert_eq!(graph.get("p2").unwrap().attr_str("content"), Some("Shared"));
        assert_eq!(graph.get("p1").unwrap().attr_str("text"), Some("One"));
        assert!(!graph.is_clone("p2"));
        assert!(graph.validate().is_ok());

        undo(&mut graph, &changes);
        assert_eq!(graph, sample());
    }

    #[test]
    fn remove_one_clone_edge_keeps_record() {
        let mut graph = sample();
        graph
            .remove("info", RemoveTarget::Edge("a1".into()))
            .unwrap();
        assert!(graph.contains("info"));
        assert!(graph.children("a1").is_empty());
        assert_eq!(graph.children("a2"), ids(&["info"]));
    }

    #[test]
    fn remove_cascades_to_unparented_children() {
        let mut graph = sample();
        let changes = graph.remove("q", RemoveTarget::Everywhere).unwrap();
        for gone in ["q", "a1", "a2", "info"] {
            assert!(!graph.contains(gone), "{gone} should be deleted");
        }
        assert_eq!(graph.children("_root"), ids(&["end"]));
        assert!(graph.validate().is_ok());

        undo(&mut graph, &changes);
        assert_eq!(graph, sample());
    }

    #[test]
    fn remove_errors() {
        let mut graph = sample();
        assert!(matches!(
            graph.remove("ghost", RemoveTarget::Everywhere),
            Err(GraphError::NodeNotFound { .. })
        ));
        assert_eq!(
            graph.remove("_root", RemoveTarget::Everywhere),
            Err(GraphError::RootProtected)
        );
        assert!(matches!(
            graph.remove("info", RemoveTarget::Edge("ghost".into())),
            Err(GraphError::ParentNotFound { .. })
        ));
        assert!(matches!(
            graph.remove("info", RemoveTarget::Edge("q".into())),
            Err(GraphError::NotConnected { .. })
        ));
    }

    #[test]
    fn failed_step_rolls_back_earlier_patches() {
        let mut graph = sample();
        let result = graph.record(|rec| {
            rec.push(Patch::InsertNode {
                id: "x".into(),
                record: NodeRecord::new(NodeKind::CONTENT),
            })?;
            rec.push(Patch::InsertChild {
                parent: "_root".into(),
                index: 0,
                child: "x".into(),
            })?;
            rec.push(Patch::DeleteChild {
                parent: "q".into(),
                index: 5,
                child: "a1".into(),
            })
        });
        assert!(matches!(result, Err(GraphError::PatchConflict { .. })));
        assert_eq!(graph, sample());
    }

    #[test]
    fn move_within_parent_emits_two_replacements() {
        let mut graph = sample();
        let changes = graph
            .move_node("a2", "q", MoveTarget::Before("a1".into()))
            .unwrap();
        assert_eq!(graph.children("q"), ids(&["a2", "a1"]));
        assert_eq!(
            changes.forward,
            vec![
                Patch::ReplaceChild {
                    parent: "q".into(),
                    index: 0,
                    old: "a1".into(),
                    new: "a2".into(),
                },
                Patch::ReplaceChild {
                    parent: "q".into(),
                    index: 1,
                    old: "a2".into(),
                    new: "a1".into(),
                },
            ]
        );
        undo(&mut graph, &changes);
        assert_eq!(graph.children("q"), ids(&["a1", "a2"]));
    }

    #[test]
    fn move_before_itself_is_a_no_op() {
        let mut graph = sample();
        let changes = graph
            .move_node("a1", "q", MoveTarget::Before("a1".into()))
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(graph, sample());
    }

    #[test]
    fn move_across_parents() {
        let mut graph = sample();
        let changes = graph
            .move_node(
                "end",
                "_root",
                MoveTarget::To {
                    parent: "a2".into(),
                    before: Some("info".into()),
                },
            )
            .unwrap();
        assert_eq!(graph.children("_root"), ids(&["q"]));
        assert_eq!(graph.children("a2"), ids(&["end", "info"]));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn move_validation_order() {
        let mut graph = sample();
        let to = |parent: &str, before: Option<&str>| MoveTarget::To {
            parent: parent.into(),
            before: before.map(NodeId::from),
        };

        let cases = [
            graph.move_node("ghost", "q", to("_root", None)),
            graph.move_node("a1", "ghost", to("_root", None)),
            graph.move_node("a1", "_root", to("q", None)),
            graph.move_node("a1", "q", to("ghost", None)),
            graph.move_node("a1", "q", to("_root", Some("a2"))),
            graph.move_node("info", "a1", to("a2", None)),
            graph.move_node("q", "_root", to("a1", None)),
        ];
        let kinds: Vec<ErrorKind> = cases.iter().map(|r| r.as_ref().unwrap_err().kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::UnknownIdentifier,
                ErrorKind::UnknownIdentifier,
                ErrorKind::InvalidEdge,
                ErrorKind::UnknownIdentifier,
                ErrorKind::InvalidEdge,
                ErrorKind::InvalidEdge,
                ErrorKind::CycleDetected,
            ]
        );
        assert!(matches!(cases[3], Err(GraphError::DestinationNotFound { .. })));
        assert_eq!(graph, sample());
    }

    #[test]
    fn sections_stay_on_root() {
        let mut graph = sample();
        graph
            .add("_root", Position::End, "s", NodeRecord::new(NodeKind::SECTION))
            .unwrap();
        let err = graph
            .move_node(
                "s",
                "_root",
                MoveTarget::To {
                    parent: "q".into(),
                    before: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::SectionPlacement { .. }));
        let err = graph.connect("a1", "s", Position::End).unwrap_err();
        assert!(matches!(err, GraphError::SectionPlacement { .. }));
    }

    #[test]
    fn connect_and_disconnect() {
        let mut graph = sample();
        graph.connect("a1", "end", Position::End).unwrap();
        assert!(graph.is_clone("end"));
        assert!(matches!(
            graph.connect("a1", "end", Position::End),
            Err(GraphError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            graph.connect("info", "q", Position::End),
            Err(GraphError::CycleDetected { .. })
        ));

        graph.disconnect("a1", "end").unwrap();
        assert!(!graph.is_clone("end"));
        assert!(matches!(
            graph.disconnect("a1", "end"),
            Err(GraphError::NotConnected { .. })
        ));
    }

    #[test]
    fn clone_restrictions() {
        let mut graph = sample();
        graph
            .add(
                "_root",
                Position::End,
                "portal",
                NodeRecord::new(NodeKind::EXTERNAL_PORTAL).with_attr("flowId", "other"),
            )
            .unwrap();
        let err = graph.clone_node("portal", "a1", Position::End).unwrap_err();
        assert!(matches!(err, GraphError::CloneRestricted { .. }));

        graph.clone_node("end", "a1", Position::End).unwrap();
        assert_eq!(graph.parents_of("end").len(), 2);
    }

    #[test]
    fn update_sanitises_and_clears() {
        let mut graph = sample();
        let mut changes = Attributes::new();
        changes.insert("text".into(), json!("  Pick\u{200B} one↵ "));
        changes.insert("description".into(), json!(""));
        changes.insert("fn".into(), json!("proposal.type"));
        let set = graph.update("q", changes).unwrap();

        let q = graph.get("q").unwrap();
        assert_eq!(q.attr_str("text"), Some("Pick one"));
        assert_eq!(q.attr_str("fn"), Some("proposal.type"));
        assert!(q.attr("description").is_none());
        assert_eq!(set.len(), 2);

        let mut clear = Attributes::new();
        clear.insert("fn".into(), Value::Null);
        graph.update("q", clear).unwrap();
        assert!(graph.get("q").unwrap().attr("fn").is_none());
    }

    #[test]
    fn make_unique_copies_unshared_descendants() {
        let mut graph = sample();
        graph.connect("_root", "a1", Position::End).unwrap();
        let before = graph.clone();

        let mut n = 0;
        let mut next = || {
            n += 1;
            NodeId::new(format!("copy{n}"))
        };
        let (changes, copy) = graph.make_unique("a1", "_root", &mut next).unwrap();

        assert_eq!(copy, "copy1");
        assert_eq!(graph.children("_root"), ids(&["q", "end", "copy1"]));
        // `info` is itself a clone, so the copy links to it.
        assert_eq!(graph.children("copy1"), ids(&["info"]));
        assert_eq!(graph.children("q"), ids(&["a1", "a2"]));
        assert!(graph.validate().is_ok());

        undo(&mut graph, &changes);
        assert_eq!(graph, before);
    }
}
