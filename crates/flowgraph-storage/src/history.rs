//! Restore points over persisted edit history.

use tracing::info;
use uuid::Uuid;

use flowgraph_core::FlowGraph;

use crate::error::StorageError;
use crate::traits::{FlowStore, HistoryStore};
use crate::types::FlowId;

/// Rolls the draft of `flow` back to the state right after `entry`.
///
/// Every later entry is reverted newest first and dropped from the
/// history. The restored draft is saved and returned.
pub async fn restore_to<S>(store: &S, flow: &FlowId, entry: Uuid) -> Result<FlowGraph, StorageError>
where
    S: FlowStore + HistoryStore + ?Sized,
{
    let mut graph = store.load(flow).await?;
    let dropped = store.truncate_after(flow, entry).await?;

    for later in dropped.iter().rev() {
        graph.apply_patches(&later.changes.reverse)?;
    }
    store.save(flow, &graph).await?;

    info!(flow = %flow, entry = %entry, reverted = dropped.len(), "restored flow to history entry");
    Ok(graph)
}
