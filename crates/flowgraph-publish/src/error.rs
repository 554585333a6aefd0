//! Error types for the publish pipeline.

use thiserror::Error;

use flowgraph_core::{GraphError, NodeId};
use flowgraph_storage::{FlowId, StorageError};

use crate::validate::ValidationFailure;

/// Invalid publish configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Errors produced while resolving external portals.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A flow reaches itself through a chain of external portals.
    #[error("external portals form a cycle: {}", display_path(.path))]
    PortalCycle { path: Vec<FlowId> },

    /// A portal points at a flow with no published snapshot.
    #[error("portal {node} references flow {flow}, which has never been published")]
    UnpublishedPortal { node: NodeId, flow: FlowId },

    /// An external portal node carries no target flow.
    #[error("external portal {node} has no target flow")]
    MissingPortalTarget { node: NodeId },

    /// Portals nest deeper than the configured limit.
    #[error("external portals nest deeper than {limit} levels at flow {flow}")]
    PortalDepthExceeded { flow: FlowId, limit: usize },
}

fn display_path(path: &[FlowId]) -> String {
    path.iter()
        .map(FlowId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors produced by publish and template refresh.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Flatten(#[from] FlattenError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The flattened flow breaks a publish rule.
    #[error("{0}")]
    Invalid(ValidationFailure),

    /// Refresh was asked for a flow with no source template.
    #[error("flow {flow} is not a templated flow")]
    NotTemplated { flow: FlowId },

    /// The source template has never been published.
    #[error("template {template} has never been published")]
    TemplateNotPublished { template: FlowId },
}

impl From<ValidationFailure> for PublishError {
    fn from(failure: ValidationFailure) -> Self {
        PublishError::Invalid(failure)
    }
}
