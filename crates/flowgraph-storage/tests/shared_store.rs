//! The in-memory backend shared between tokio tasks.

use std::sync::Arc;

use flowgraph_core::{ChangeSet, FlowGraph, NodeKind, NodeRecord, Position};
use flowgraph_storage::{
    FlowId, FlowStore, HistoryStore, InMemoryStore, NewPublish, PublishFacts, PublishedSnapshots,
};

#[tokio::test]
async fn concurrent_publishes_get_distinct_versions() {
    let store = Arc::new(InMemoryStore::new());
    let flow = FlowId::from("shared");

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let flow = flow.clone();
        handles.push(tokio::spawn(async move {
            store
                .record_published(NewPublish {
                    flow_id: flow,
                    graph: FlowGraph::new(),
                    publisher: format!("editor-{i}"),
                    summary: None,
                    facts: PublishFacts::default(),
                })
                .await
                .unwrap()
                .version
        }));
    }

    let mut versions = Vec::new();
    for handle in handles {
        versions.push(handle.await.unwrap());
    }
    versions.sort();
    assert_eq!(versions, (1..=8).collect::<Vec<u64>>());
}

#[tokio::test]
async fn history_entries_carry_actor_and_changes() {
    let store = Arc::new(InMemoryStore::new());
    let flow = FlowId::from("flow");

    let mut graph = FlowGraph::new();
    let changes: ChangeSet = graph
        .add("_root", Position::End, "n", NodeRecord::new(NodeKind::NOTICE))
        .unwrap();
    store.save(&flow, &graph).await.unwrap();

    let entry = store.append(&flow, "alice", &changes).await.unwrap();
    let listed = store.list(&flow).await.unwrap();
    assert_eq!(listed, vec![entry.clone()]);
    assert_eq!(listed[0].actor, "alice");
    assert_eq!(listed[0].changes.forward.len(), 2);

    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["flow_id"], "flow");
    assert_eq!(json["changes"]["forward"][0]["op"], "insert_node");
}
