//! Storage error types for flowgraph-storage.

use thiserror::Error;
use uuid::Uuid;

use flowgraph_core::GraphError;

use crate::types::FlowId;

/// Errors produced by storage collaborators.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No draft is stored under this flow id.
    #[error("flow not found: {0}")]
    FlowNotFound(FlowId),

    /// The history of `flow` has no entry with this id.
    #[error("history entry not found: flow={flow}, entry={entry}")]
    HistoryEntryNotFound { flow: FlowId, entry: Uuid },

    /// Stored patches no longer apply to the stored graph.
    #[error("stored graph is inconsistent: {0}")]
    Graph(#[from] GraphError),

    /// The backing store failed for a reason of its own.
    #[error("backend error: {reason}")]
    Backend { reason: String },
}
