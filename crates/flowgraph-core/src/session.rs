//! Edit session with linear undo/redo.
//!
//! [`EditSession`] owns one graph and routes every editor operation through
//! the mutation engine, keeping the resulting [`ChangeSet`]s as history.
//! Undo applies the newest reverse list; redo re-applies the forward list.
//! A new edit invalidates the redo stack.

use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::mutation::{MoveTarget, Position, RemoveTarget};
use crate::node::{Attributes, NodeRecord, NodeTree};
use crate::patch::ChangeSet;

/// Single-writer editing state for one flow.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    graph: FlowGraph,
    history: Vec<ChangeSet>,
    undone: Vec<ChangeSet>,
}

impl EditSession {
    pub fn new(graph: FlowGraph) -> Self {
        EditSession {
            graph,
            history: Vec::new(),
            undone: Vec::new(),
        }
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn into_graph(self) -> FlowGraph {
        self.graph
    }

    /// Applied change sets, oldest first.
    pub fn history(&self) -> &[ChangeSet] {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Records a successful mutation. Empty change sets are not recorded.
    fn commit(&mut self, result: Result<ChangeSet, GraphError>) -> Result<ChangeSet, GraphError> {
        let changes = result?;
        if !changes.is_empty() {
            self.history.push(changes.clone());
            self.undone.clear();
        }
        Ok(changes)
    }

    pub fn add(
        &mut self,
        parent: &str,
        position: Position,
        id: impl Into<NodeId>,
        record: NodeRecord,
    ) -> Result<ChangeSet, GraphError> {
        let result = self.graph.add(parent, position, id, record);
        self.commit(result)
    }

    pub fn add_tree(
        &mut self,
        parent: &str,
        position: Position,
        tree: &NodeTree,
    ) -> Result<ChangeSet, GraphError> {
        let result = self.graph.add_tree(parent, position, tree);
        self.commit(result)
    }

    pub fn remove(&mut self, id: &str, target: RemoveTarget) -> Result<ChangeSet, GraphError> {
        let result = self.graph.remove(id, target);
        self.commit(result)
    }

    pub fn move_node(
        &mut self,
        id: &str,
        from_parent: &str,
        target: MoveTarget,
    ) -> Result<ChangeSet, GraphError> {
        let result = self.graph.move_node(id, from_parent, target);
        self.commit(result)
    }

    pub fn connect(
        &mut self,
        parent: &str,
        child: &str,
        position: Position,
    ) -> Result<ChangeSet, GraphError> {
        let result = self.graph.connect(parent, child, position);
        self.commit(result)
    }

    pub fn disconnect(&mut self, parent: &str, child: &str) -> Result<ChangeSet, GraphError> {
        let result = self.graph.disconnect(parent, child);
        self.commit(result)
    }

    pub fn clone_node(
        &mut self,
        id: &str,
        to_parent: &str,
        position: Position,
    ) -> Result<ChangeSet, GraphError> {
        let result = self.graph.clone_node(id, to_parent, position);
        self.commit(result)
    }

    pub fn update(&mut self, id: &str, changes: Attributes) -> Result<ChangeSet, GraphError> {
        let result = self.graph.update(id, changes);
        self.commit(result)
    }

    /// Replaces one clone edge with a deep copy using random ids.
    pub fn make_unique(&mut self, id: &str, parent: &str) -> Result<NodeId, GraphError> {
        let (changes, copy) = self.graph.make_unique(id, parent, &mut NodeId::random)?;
        self.commit(Ok(changes))?;
        Ok(copy)
    }

    /// Pastes a copied tree under `parent` using random ids. Returns the id
    /// of the pasted top node.
    pub fn paste(
        &mut self,
        parent: &str,
        position: Position,
        tree: NodeTree,
    ) -> Result<NodeId, GraphError> {
        let (changes, top) = self.graph.paste(parent, position, tree, &mut NodeId::random)?;
        self.commit(Ok(changes))?;
        Ok(top)
    }

    /// Reverts the newest change set. Returns the patches applied, or `None`
    /// when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<ChangeSet>, GraphError> {
        let Some(changes) = self.history.pop() else {
            return Ok(None);
        };
        if let Err(err) = self.graph.apply_patches(&changes.reverse) {
            self.history.push(changes);
            return Err(err);
        }
        let applied = changes.inverted();
        self.undone.push(changes);
        Ok(Some(applied))
    }

    /// Re-applies the most recently undone change set.
    pub fn redo(&mut self) -> Result<Option<ChangeSet>, GraphError> {
        let Some(changes) = self.undone.pop() else {
            return Ok(None);
        };
        if let Err(err) = self.graph.apply_patches(&changes.forward) {
            self.undone.push(changes);
            return Err(err);
        }
        self.history.push(changes.clone());
        Ok(Some(changes))
    }
}
