//! Storage-layer types for flow identity, published snapshots and history.
//!
//! [`FlowId`] is defined here (not in flowgraph-core) because flow identity
//! is a storage concern: the engine itself only ever sees one graph at a
//! time, apart from the flattener which resolves portals through these ids.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flowgraph_core::{ChangeSet, FlowGraph};

/// Unique identifier for a stored flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        FlowId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlowId {
    fn from(id: &str) -> Self {
        FlowId(id.to_string())
    }
}

/// Side-effect facts recorded alongside a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishFacts {
    /// The flow submits applications somewhere.
    pub has_send_component: bool,
    /// The flow is split into sections.
    pub has_sections: bool,
    /// The flow takes a payment that applicants can see.
    pub has_pay_component: bool,
}

/// One published snapshot of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedFlow {
    pub flow_id: FlowId,
    /// Increments by one per publish of the same flow, starting at 1.
    pub version: u64,
    /// Flattened graph as served to applicants.
    pub graph: FlowGraph,
    pub publisher: String,
    pub summary: Option<String>,
    pub facts: PublishFacts,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a new published snapshot.
#[derive(Debug, Clone)]
pub struct NewPublish {
    pub flow_id: FlowId,
    pub graph: FlowGraph,
    pub publisher: String,
    pub summary: Option<String>,
    pub facts: PublishFacts,
}

/// One persisted entry of a flow's edit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub flow_id: FlowId,
    pub actor: String,
    pub changes: ChangeSet,
    pub created_at: DateTime<Utc>,
}
