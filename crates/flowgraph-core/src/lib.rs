pub mod error;
pub mod graph;
pub mod id;
pub mod mutation;
pub mod node;
pub mod patch;
pub mod session;
pub mod summary;
pub mod template;

// Re-export commonly used types
pub use error::{ErrorKind, GraphError};
pub use graph::{FlowGraph, NodeMap};
pub use id::{NodeId, ROOT_NODE_KEY};
pub use mutation::{MoveTarget, Position, RemoveTarget};
pub use node::{Attributes, NodeKind, NodeRecord, NodeTree, Provenance};
pub use patch::{ChangeSet, Patch};
pub use session::EditSession;
pub use template::{NodeOverride, TemplatedEdits};
