//! Publish pipeline for flowgraph.
//!
//! Turns an edited draft into a published snapshot and keeps templated
//! flows in step with their source template.
//!
//! # Modules
//!
//! - [`config`]: PublishConfig and its environment overrides
//! - [`error`]: ConfigError, FlattenError and PublishError
//! - [`flatten`]: external portal resolution
//! - [`validate`]: section and invite-to-pay publish rules
//! - [`diff`]: node-level delta and side-effect facts
//! - [`merge`]: templated edits over a new template version
//! - [`service`]: PublishService and TemplateRefresh

pub mod config;
pub mod diff;
pub mod error;
pub mod flatten;
pub mod merge;
pub mod service;
pub mod validate;

// Re-export commonly used types
pub use config::PublishConfig;
pub use diff::{diff, publish_diff, scan_facts, AlteredNode, DiffOutcome, FlowDelta};
pub use error::{ConfigError, FlattenError, PublishError};
pub use flatten::{flatten, flatten_graph, FlattenOptions, Flattened};
pub use merge::{merge, MergeReport};
pub use service::{PublishOutcome, PublishService, TemplateRefresh};
pub use validate::{validate_for_publish, ValidationFailure};
