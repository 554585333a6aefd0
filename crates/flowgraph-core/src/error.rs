//! Core error types for flowgraph-core.
//!
//! Every precondition checked by the mutation engine has its own variant so
//! the editor can surface the exact reason to the operator. [`ErrorKind`]
//! groups the variants into the coarse taxonomy callers branch on.

use thiserror::Error;

use crate::id::NodeId;

/// Errors produced by graph queries, mutations and patch application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The node being operated on does not exist.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// The (source) parent does not exist.
    #[error("parent not found: {id}")]
    ParentNotFound { id: NodeId },

    /// The destination parent of a move/connect does not exist.
    #[error("destination parent not found: {id}")]
    DestinationNotFound { id: NodeId },

    /// A sibling named as an insertion point is not a child of the parent.
    #[error("{sibling} is not a child of {parent}")]
    SiblingNotFound { parent: NodeId, sibling: NodeId },

    /// The parent does not connect to the child.
    #[error("{parent} does not connect to {child}")]
    NotConnected { parent: NodeId, child: NodeId },

    /// The parent already connects to the child.
    #[error("{parent} already connects to {child}")]
    DuplicateEdge { parent: NodeId, child: NodeId },

    /// A node with this identifier already exists.
    #[error("node already exists: {id}")]
    DuplicateNode { id: NodeId },

    /// The change would make `node` reachable from itself.
    #[error("cannot create cycle in graph through {node}")]
    CycleDetected { node: NodeId },

    /// Section nodes may only hang directly off `_root`.
    #[error("section {id} must be placed directly on _root, not under {parent}")]
    SectionPlacement { id: NodeId, parent: NodeId },

    /// Sections and external portals cannot be cloned.
    #[error("cannot clone {id}: {reason}")]
    CloneRestricted { id: NodeId, reason: String },

    /// `_root` is never removed.
    #[error("the root node cannot be removed")]
    RootProtected,

    /// A children list names a node that is not in the graph.
    #[error("dangling reference: {parent} -> {child}")]
    DanglingReference { parent: NodeId, child: NodeId },

    /// A patch did not match the graph it was applied to.
    #[error("patch does not apply: {reason}")]
    PatchConflict { reason: String },
}

/// Coarse classification of [`GraphError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownIdentifier,
    InvalidEdge,
    CycleDetected,
    StructuralConstraintViolation,
    DanglingReference,
    PatchConflict,
}

impl GraphError {
    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NodeNotFound { .. }
            | GraphError::ParentNotFound { .. }
            | GraphError::DestinationNotFound { .. } => ErrorKind::UnknownIdentifier,
            GraphError::SiblingNotFound { .. }
            | GraphError::NotConnected { .. }
            | GraphError::DuplicateEdge { .. } => ErrorKind::InvalidEdge,
            GraphError::CycleDetected { .. } => ErrorKind::CycleDetected,
            GraphError::DuplicateNode { .. }
            | GraphError::SectionPlacement { .. }
            | GraphError::CloneRestricted { .. }
            | GraphError::RootProtected => ErrorKind::StructuralConstraintViolation,
            GraphError::DanglingReference { .. } => ErrorKind::DanglingReference,
            GraphError::PatchConflict { .. } => ErrorKind::PatchConflict,
        }
    }
}
