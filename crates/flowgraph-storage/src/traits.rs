//! Collaborator traits consumed by the publish pipeline.
//!
//! The engine never owns persistence. Instead it talks to these seams,
//! each of which is implemented by [`InMemoryStore`](crate::memory::InMemoryStore)
//! for tests and by whatever database layer hosts the engine in production.
//! All methods are async because real backends are remote.

use async_trait::async_trait;
use uuid::Uuid;

use flowgraph_core::{ChangeSet, FlowGraph, TemplatedEdits};

use crate::error::StorageError;
use crate::types::{FlowId, HistoryEntry, NewPublish, PublishedFlow};

/// Draft graphs as edited in the editor.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Loads the current draft of `id`.
    async fn load(&self, id: &FlowId) -> Result<FlowGraph, StorageError>;

    /// Saves (creates or overwrites) the draft of `id`.
    async fn save(&self, id: &FlowId, graph: &FlowGraph) -> Result<(), StorageError>;
}

/// Published snapshots served to applicants.
#[async_trait]
pub trait PublishedSnapshots: Send + Sync {
    /// Most recent published snapshot of `id`, or `None` if never published.
    async fn fetch_latest_published(&self, id: &FlowId)
        -> Result<Option<PublishedFlow>, StorageError>;

    /// Records a new snapshot, assigning the next version number.
    async fn record_published(&self, publish: NewPublish) -> Result<PublishedFlow, StorageError>;
}

/// Persisted patch history for collaborative editing and restore points.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one change set, tagged with the acting user and a timestamp.
    async fn append(
        &self,
        flow: &FlowId,
        actor: &str,
        changes: &ChangeSet,
    ) -> Result<HistoryEntry, StorageError>;

    /// History of `flow`, oldest first.
    async fn list(&self, flow: &FlowId) -> Result<Vec<HistoryEntry>, StorageError>;

    /// Drops every entry recorded after `entry` and returns them, oldest
    /// first.
    async fn truncate_after(
        &self,
        flow: &FlowId,
        entry: Uuid,
    ) -> Result<Vec<HistoryEntry>, StorageError>;
}

/// Links between source templates and the flows derived from them.
#[async_trait]
pub trait TemplateRegistry: Send + Sync {
    /// Flows derived from `template`.
    async fn templated_flows(&self, template: &FlowId) -> Result<Vec<FlowId>, StorageError>;

    /// Source template of `flow`, if it is a templated flow.
    async fn template_of(&self, flow: &FlowId) -> Result<Option<FlowId>, StorageError>;

    /// Operator edits recorded against a templated flow.
    async fn templated_edits(&self, flow: &FlowId) -> Result<TemplatedEdits, StorageError>;
}

/// Downstream notification that templated flows need refreshing.
#[async_trait]
pub trait RefreshScheduler: Send + Sync {
    async fn schedule(&self, template: &FlowId, flows: &[FlowId]) -> Result<(), StorageError>;
}
