//! Reversible patches.
//!
//! Every structural change to a [`FlowGraph`] is expressed as a list of
//! [`Patch`]es. Each patch carries enough state to be inverted, so undo is
//! simply "apply the inverses in reverse order". Patches are also the unit of
//! collaborative transport and of persisted history.
//!
//! Application is checked: a patch whose recorded state does not match the
//! graph fails with [`GraphError::PatchConflict`] and leaves the graph
//! untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::graph::FlowGraph;
use crate::id::NodeId;
use crate::node::NodeRecord;

/// One minimal, reversible change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// A node record was added to the map.
    InsertNode { id: NodeId, record: NodeRecord },
    /// A node record was removed (captures the full record for undo).
    DeleteNode { id: NodeId, record: NodeRecord },
    /// `child` was inserted into `parent`'s children at `index`.
    InsertChild {
        parent: NodeId,
        index: usize,
        child: NodeId,
    },
    /// `child` was removed from `parent`'s children at `index`.
    DeleteChild {
        parent: NodeId,
        index: usize,
        child: NodeId,
    },
    /// The child at `index` changed from `old` to `new`.
    ReplaceChild {
        parent: NodeId,
        index: usize,
        old: NodeId,
        new: NodeId,
    },
    /// One attribute changed. `None` means absent.
    SetAttribute {
        id: NodeId,
        key: String,
        old: Option<Value>,
        new: Option<Value>,
    },
}

impl Patch {
    /// Returns the patch that undoes this one.
    pub fn inverse(&self) -> Patch {
        match self {
            Patch::InsertNode { id, record } => Patch::DeleteNode {
                id: id.clone(),
                record: record.clone(),
            },
            Patch::DeleteNode { id, record } => Patch::InsertNode {
                id: id.clone(),
                record: record.clone(),
            },
            Patch::InsertChild {
                parent,
                index,
                child,
            } => Patch::DeleteChild {
                parent: parent.clone(),
                index: *index,
                child: child.clone(),
            },
            Patch::DeleteChild {
                parent,
                index,
                child,
            } => Patch::InsertChild {
                parent: parent.clone(),
                index: *index,
                child: child.clone(),
            },
            Patch::ReplaceChild {
                parent,
                index,
                old,
                new,
            } => Patch::ReplaceChild {
                parent: parent.clone(),
                index: *index,
                old: new.clone(),
                new: old.clone(),
            },
            Patch::SetAttribute { id, key, old, new } => Patch::SetAttribute {
                id: id.clone(),
                key: key.clone(),
                old: new.clone(),
                new: old.clone(),
            },
        }
    }

    /// The node whose record this patch touches.
    pub fn target(&self) -> &NodeId {
        match self {
            Patch::InsertNode { id, .. }
            | Patch::DeleteNode { id, .. }
            | Patch::SetAttribute { id, .. } => id,
            Patch::InsertChild { parent, .. }
            | Patch::DeleteChild { parent, .. }
            | Patch::ReplaceChild { parent, .. } => parent,
        }
    }
}

fn conflict(reason: String) -> GraphError {
    GraphError::PatchConflict { reason }
}

impl FlowGraph {
    /// Applies one patch, checking that the graph matches its recorded state.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<(), GraphError> {
        match patch {
            Patch::InsertNode { id, record } => {
                if self.contains(id.as_str()) {
                    return Err(conflict(format!("node {id} already exists")));
                }
                self.nodes.insert(id.clone(), record.clone());
            }
            Patch::DeleteNode { id, record } => {
                match self.get(id.as_str()) {
                    None => return Err(conflict(format!("node {id} does not exist"))),
                    Some(current) if current != record => {
                        return Err(conflict(format!("node {id} differs from recorded state")))
                    }
                    Some(_) => {}
                }
                self.nodes.shift_remove(id.as_str());
            }
            Patch::InsertChild {
                parent,
                index,
                child,
            } => {
                let record = self
                    .get_mut(parent.as_str())
                    .ok_or_else(|| conflict(format!("parent {parent} does not exist")))?;
                if *index > record.children.len() {
                    return Err(conflict(format!(
                        "index {index} out of bounds for {parent}"
                    )));
                }
                record.children.insert(*index, child.clone());
            }
            Patch::DeleteChild {
                parent,
                index,
                child,
            } => {
                let record = self
                    .get_mut(parent.as_str())
                    .ok_or_else(|| conflict(format!("parent {parent} does not exist")))?;
                if record.children.get(*index) != Some(child) {
                    return Err(conflict(format!(
                        "{parent} has no {child} at index {index}"
                    )));
                }
                record.children.remove(*index);
            }
            Patch::ReplaceChild {
                parent,
                index,
                old,
                new,
            } => {
                let record = self
                    .get_mut(parent.as_str())
                    .ok_or_else(|| conflict(format!("parent {parent} does not exist")))?;
                match record.children.get_mut(*index) {
                    Some(slot) if *slot == *old => *slot = new.clone(),
                    _ => {
                        return Err(conflict(format!("{parent} has no {old} at index {index}")))
                    }
                }
            }
            Patch::SetAttribute { id, key, old, new } => {
                let record = self
                    .get_mut(id.as_str())
                    .ok_or_else(|| conflict(format!("node {id} does not exist")))?;
                if record.attributes.get(key) != old.as_ref() {
                    return Err(conflict(format!(
                        "attribute {key} of {id} differs from recorded state"
                    )));
                }
                match new {
                    Some(value) => {
                        record.attributes.insert(key.clone(), value.clone());
                    }
                    None => {
                        record.attributes.shift_remove(key);
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies patches in order, all-or-nothing.
    ///
    /// On the first conflict every patch already applied is reverted and the
    /// conflict is returned.
    pub fn apply_patches(&mut self, patches: &[Patch]) -> Result<(), GraphError> {
        for (applied, patch) in patches.iter().enumerate() {
            if let Err(err) = self.apply_patch(patch) {
                for done in patches[..applied].iter().rev() {
                    // The inverse of a patch that just applied always applies.
                    let reverted = self.apply_patch(&done.inverse());
                    debug_assert!(reverted.is_ok(), "revert failed: {reverted:?}");
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Forward and reverse patch lists of one mutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub forward: Vec<Patch>,
    pub reverse: Vec<Patch>,
}

impl ChangeSet {
    /// Pairs `forward` with its computed reverse list.
    pub fn from_forward(forward: Vec<Patch>) -> Self {
        let reverse = forward.iter().rev().map(Patch::inverse).collect();
        ChangeSet { forward, reverse }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Swaps the forward and reverse lists.
    pub fn inverted(&self) -> ChangeSet {
        ChangeSet {
            forward: self.reverse.clone(),
            reverse: self.forward.clone(),
        }
    }

    /// Appends another change set that was applied after this one.
    pub fn extend(&mut self, later: ChangeSet) {
        self.forward.extend(later.forward);
        let mut reverse = later.reverse;
        reverse.append(&mut self.reverse);
        self.reverse = reverse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;

    fn graph() -> FlowGraph {
        FlowGraph::from_json(json!({
            "_root": {"edges": ["a", "b"]},
            "a": {"type": 250, "data": {"title": "A"}},
            "b": {"type": 250}
        }))
        .unwrap()
    }

    #[test]
    fn inverse_is_an_involution() {
        let patch = Patch::ReplaceChild {
            parent: NodeId::root(),
            index: 0,
            old: "a".into(),
            new: "b".into(),
        };
        assert_eq!(patch.inverse().inverse(), patch);
    }

    #[test]
    fn apply_then_reverse_restores() {
        let original = graph();
        let mut g = original.clone();
        let changes = ChangeSet::from_forward(vec![
            Patch::InsertNode {
                id: "c".into(),
                record: NodeRecord::new(NodeKind::NOTICE),
            },
            Patch::InsertChild {
                parent: NodeId::root(),
                index: 1,
                child: "c".into(),
            },
            Patch::SetAttribute {
                id: "a".into(),
                key: "title".into(),
                old: Some(json!("A")),
                new: None,
            },
        ]);
        g.apply_patches(&changes.forward).unwrap();
        assert_eq!(g.children("_root"), &["a", "c", "b"].map(NodeId::from));
        assert!(g.get("a").unwrap().attributes.is_empty());

        g.apply_patches(&changes.reverse).unwrap();
        assert_eq!(g, original);
    }

    #[test]
    fn stale_patch_conflicts() {
        let mut g = graph();
        let err = g
            .apply_patch(&Patch::DeleteChild {
                parent: NodeId::root(),
                index: 0,
                child: "b".into(),
            })
            .unwrap_err();
        assert!(matches!(err, GraphError::PatchConflict { .. }));
    }

    #[test]
    fn failed_batch_is_rolled_back() {
        let original = graph();
        let mut g = original.clone();
        let err = g.apply_patches(&[
            Patch::DeleteChild {
                parent: NodeId::root(),
                index: 1,
                child: "b".into(),
            },
            Patch::DeleteNode {
                id: "missing".into(),
                record: NodeRecord::default(),
            },
        ]);
        assert!(err.is_err());
        assert_eq!(g, original);
    }

    #[test]
    fn serializes_with_op_tag() {
        let json = serde_json::to_value(Patch::DeleteChild {
            parent: NodeId::root(),
            index: 2,
            child: "x".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"op": "delete_child", "parent": "_root", "index": 2, "child": "x"})
        );
    }

    #[test]
    fn extend_keeps_reverse_order() {
        let first = ChangeSet::from_forward(vec![Patch::InsertNode {
            id: "x".into(),
            record: NodeRecord::default(),
        }]);
        let second = ChangeSet::from_forward(vec![Patch::InsertChild {
            parent: NodeId::root(),
            index: 0,
            child: "x".into(),
        }]);
        let mut combined = first.clone();
        combined.extend(second);
        assert_eq!(combined.len(), 2);
        assert!(matches!(combined.reverse[0], Patch::DeleteChild { .. }));
        assert!(matches!(combined.reverse[1], Patch::DeleteNode { .. }));
    }
}
