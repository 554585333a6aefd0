//! In-memory implementation of every collaborator trait.
//!
//! [`InMemoryStore`] is a first-class backend for tests and editor previews.
//! All data lives in `DashMap`s so one store can be shared between tokio
//! tasks behind an `Arc`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use flowgraph_core::{ChangeSet, FlowGraph, TemplatedEdits};

use crate::error::StorageError;
use crate::traits::{FlowStore, HistoryStore, PublishedSnapshots, RefreshScheduler, TemplateRegistry};
use crate::types::{FlowId, HistoryEntry, NewPublish, PublishedFlow};

/// In-memory store for drafts, snapshots, history and template links.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    drafts: DashMap<FlowId, FlowGraph>,
    /// Published snapshots per flow, oldest first.
    published: DashMap<FlowId, Vec<PublishedFlow>>,
    history: DashMap<FlowId, Vec<HistoryEntry>>,
    /// Templated flow -> source template.
    templates: DashMap<FlowId, FlowId>,
    edits: DashMap<FlowId, TemplatedEdits>,
    /// Source template -> flows handed to the scheduler, in arrival order.
    scheduled: DashMap<FlowId, Vec<FlowId>>,
    published_fetches: DashMap<FlowId, usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Registers `flow` as derived from `template`.
    pub fn link_template(&self, flow: FlowId, template: FlowId) {
        self.templates.insert(flow, template);
    }

    /// Replaces the operator edits of a templated flow.
    pub fn set_templated_edits(&self, flow: FlowId, edits: TemplatedEdits) {
        self.edits.insert(flow, edits);
    }

    /// Flows handed to the scheduler for `template` so far.
    pub fn scheduled_refreshes(&self, template: &FlowId) -> Vec<FlowId> {
        self.scheduled
            .get(template)
            .map(|flows| flows.clone())
            .unwrap_or_default()
    }

    /// Number of times the latest snapshot of `id` was fetched.
    pub fn published_fetches(&self, id: &FlowId) -> usize {
        self.published_fetches.get(id).map_or(0, |count| *count)
    }

    /// Every published snapshot of `id`, oldest first.
    pub fn published_versions(&self, id: &FlowId) -> Vec<PublishedFlow> {
        self.published
            .get(id)
            .map(|versions| versions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FlowStore for InMemoryStore {
    async fn load(&self, id: &FlowId) -> Result<FlowGraph, StorageError> {
        self.drafts
            .get(id)
            .map(|graph| graph.clone())
            .ok_or_else(|| StorageError::FlowNotFound(id.clone()))
    }

    async fn save(&self, id: &FlowId, graph: &FlowGraph) -> Result<(), StorageError> {
        self.drafts.insert(id.clone(), graph.clone());
        Ok(())
    }
}

#[async_trait]
impl PublishedSnapshots for InMemoryStore {
    async fn fetch_latest_published(
        &self,
        id: &FlowId,
    ) -> Result<Option<PublishedFlow>, StorageError> {
        *self.published_fetches.entry(id.clone()).or_insert(0) += 1;
        Ok(self
            .published
            .get(id)
            .and_then(|versions| versions.last().cloned()))
    }

    async fn record_published(&self, publish: NewPublish) -> Result<PublishedFlow, StorageError> {
        let mut versions = self.published.entry(publish.flow_id.clone()).or_default();
        let version = versions.last().map_or(1, |latest| latest.version + 1);
        let record = PublishedFlow {
            flow_id: publish.flow_id,
            version,
            graph: publish.graph,
            publisher: publish.publisher,
            summary: publish.summary,
            facts: publish.facts,
            created_at: Utc::now(),
        };
        versions.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn append(
        &self,
        flow: &FlowId,
        actor: &str,
        changes: &ChangeSet,
    ) -> Result<HistoryEntry, StorageError> {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            flow_id: flow.clone(),
            actor: actor.to_string(),
            changes: changes.clone(),
            created_at: Utc::now(),
        };
        self.history
            .entry(flow.clone())
            .or_default()
            .push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, flow: &FlowId) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(self
            .history
            .get(flow)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    async fn truncate_after(
        &self,
        flow: &FlowId,
        entry: Uuid,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let not_found = || StorageError::HistoryEntryNotFound {
            flow: flow.clone(),
            entry,
        };
        let mut entries = self.history.get_mut(flow).ok_or_else(not_found)?;
        let position = entries
            .iter()
            .position(|e| e.id == entry)
            .ok_or_else(not_found)?;
        Ok(entries.split_off(position + 1))
    }
}

#[async_trait]
impl TemplateRegistry for InMemoryStore {
    async fn templated_flows(&self, template: &FlowId) -> Result<Vec<FlowId>, StorageError> {
        let mut flows: Vec<FlowId> = self
            .templates
            .iter()
            .filter(|link| link.value() == template)
            .map(|link| link.key().clone())
            .collect();
        flows.sort();
        Ok(flows)
    }

    async fn template_of(&self, flow: &FlowId) -> Result<Option<FlowId>, StorageError> {
        Ok(self.templates.get(flow).map(|template| template.clone()))
    }

    async fn templated_edits(&self, flow: &FlowId) -> Result<TemplatedEdits, StorageError> {
        Ok(self
            .edits
            .get(flow)
            .map(|edits| edits.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RefreshScheduler for InMemoryStore {
    async fn schedule(&self, template: &FlowId, flows: &[FlowId]) -> Result<(), StorageError> {
        self.scheduled
            .entry(template.clone())
            .or_default()
            .extend(flows.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublishFacts;
    use flowgraph_core::{NodeKind, NodeRecord, Position};

    fn publish(flow: &str) -> NewPublish {
        NewPublish {
            flow_id: FlowId::from(flow),
            graph: FlowGraph::new(),
            publisher: "editor@example.com".to_string(),
            summary: None,
            facts: PublishFacts::default(),
        }
    }

    #[tokio::test]
    async fn drafts_round_trip() {
        let store = InMemoryStore::new();
        let id = FlowId::from("flow-a");
        assert!(matches!(store.load(&id).await, Err(StorageError::FlowNotFound(_))));

        let mut graph = FlowGraph::new();
        graph
            .add("_root", Position::End, "n", NodeRecord::new(NodeKind::NOTICE))
            .unwrap();
        store.save(&id, &graph).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), graph);
    }

    #[tokio::test]
    async fn published_versions_increment() {
        let store = InMemoryStore::new();
        let id = FlowId::from("flow-a");
        assert_eq!(store.fetch_latest_published(&id).await.unwrap(), None);

        assert_eq!(store.record_published(publish("flow-a")).await.unwrap().version, 1);
        assert_eq!(store.record_published(publish("flow-a")).await.unwrap().version, 2);
        assert_eq!(store.record_published(publish("flow-b")).await.unwrap().version, 1);

        let latest = store.fetch_latest_published(&id).await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(store.published_fetches(&id), 2);
    }

    #[tokio::test]
    async fn history_truncates_after_entry() {
        let store = InMemoryStore::new();
        let id = FlowId::from("flow-a");
        let first = store.append(&id, "alice", &ChangeSet::default()).await.unwrap();
        store.append(&id, "bob", &ChangeSet::default()).await.unwrap();
        store.append(&id, "carol", &ChangeSet::default()).await.unwrap();

        let dropped = store.truncate_after(&id, first.id).await.unwrap();
        let actors: Vec<&str> = dropped.iter().map(|e| e.actor.as_str()).collect();
        assert_eq!(actors, vec!["bob", "carol"]);
        assert_eq!(store.list(&id).await.unwrap().len(), 1);

        let missing = store.truncate_after(&id, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(StorageError::HistoryEntryNotFound { .. })));
    }

    #[tokio::test]
    async fn template_links() {
        let store = InMemoryStore::new();
        let template = FlowId::from("template");
        store.link_template(FlowId::from("council-b"), template.clone());
        store.link_template(FlowId::from("council-a"), template.clone());

        let flows = store.templated_flows(&template).await.unwrap();
        assert_eq!(flows, vec![FlowId::from("council-a"), FlowId::from("council-b")]);
        assert_eq!(
            store.template_of(&FlowId::from("council-a")).await.unwrap(),
            Some(template.clone())
        );
        assert!(store
            .templated_edits(&FlowId::from("council-a"))
            .await
            .unwrap()
            .is_empty());

        store.schedule(&template, &flows).await.unwrap();
        assert_eq!(store.scheduled_refreshes(&template), flows);
    }
}
