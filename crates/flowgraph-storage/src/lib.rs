//! Storage seams for flowgraph.
//!
//! Provides the collaborator traits the publish pipeline consumes (draft
//! store, published snapshots, patch history, template registry, refresh
//! scheduler), the [`InMemoryStore`] backend implementing all of them, and
//! blake3 content hashing of graphs.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum
//! - [`types`]: FlowId, PublishedFlow, HistoryEntry and friends
//! - [`traits`]: collaborator trait definitions
//! - [`memory`]: InMemoryStore implementation
//! - [`hash`]: deterministic per-node hashes
//! - [`history`]: restore points over persisted history

pub mod error;
pub mod hash;
pub mod history;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::{hash_node, hash_nodes};
pub use history::restore_to;
pub use memory::InMemoryStore;
pub use traits::{FlowStore, HistoryStore, PublishedSnapshots, RefreshScheduler, TemplateRegistry};
pub use types::{FlowId, HistoryEntry, NewPublish, PublishFacts, PublishedFlow};
