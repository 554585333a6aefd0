//! Rules a flattened flow must satisfy before it can be published.

use serde::Serialize;
use thiserror::Error;

use flowgraph_core::{FlowGraph, NodeKind, NodeRecord, ROOT_NODE_KEY};

use crate::config::PublishConfig;

/// Attribute on pay nodes enabling invite-to-pay.
pub const ATTR_ALLOW_INVITE_TO_PAY: &str = "allowInviteToPay";
/// Checklist variable invite-to-pay needs to report the project type.
pub const PROJECT_TYPE_FN: &str = "proposal.projectType";

const INVALID_FLOW: &str = "Cannot publish an invalid flow";

/// A broken publish rule, phrased for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}: {description}")]
pub struct ValidationFailure {
    pub message: String,
    pub description: String,
}

impl ValidationFailure {
    fn invalid(description: &str) -> Self {
        ValidationFailure {
            message: INVALID_FLOW.to_string(),
            description: description.to_string(),
        }
    }
}

/// Non-root nodes of `kind`.
fn nodes_of_kind(graph: &FlowGraph, kind: NodeKind) -> Vec<&NodeRecord> {
    graph
        .iter()
        .filter(|(id, record)| !id.is_root() && record.is_kind(kind))
        .map(|(_, record)| record)
        .collect()
}

/// Sections must open the flow and hang directly off `_root`.
pub fn validate_sections(graph: &FlowGraph) -> Result<(), ValidationFailure> {
    let sections: Vec<_> = graph
        .iter()
        .filter(|(id, record)| !id.is_root() && record.is_section())
        .map(|(id, _)| id)
        .collect();
    if sections.is_empty() {
        return Ok(());
    }

    let top = graph.children(ROOT_NODE_KEY);
    let starts_with_section = top
        .first()
        .and_then(|first| graph.get(first.as_str()))
        .is_some_and(NodeRecord::is_section);
    if !starts_with_section {
        return Err(ValidationFailure::invalid(
            "When using Sections, your flow must start with a Section",
        ));
    }

    if sections.iter().any(|id| !top.contains(*id)) {
        return Err(ValidationFailure::invalid(
            "Found Sections in one or more External Portals, but Sections are only allowed in main flow",
        ));
    }
    Ok(())
}

/// Invite-to-pay is on when the flow takes payment and every pay node
/// allows it.
pub fn invite_to_pay_enabled(graph: &FlowGraph) -> bool {
    let pays = nodes_of_kind(graph, NodeKind::PAY);
    !pays.is_empty() && pays.iter().all(|pay| pay.flag(ATTR_ALLOW_INVITE_TO_PAY))
}

/// Components invite-to-pay depends on must be present exactly as needed.
pub fn validate_invite_to_pay(graph: &FlowGraph) -> Result<(), ValidationFailure> {
    if !invite_to_pay_enabled(graph) {
        return Ok(());
    }

    if nodes_of_kind(graph, NodeKind::PAY).len() > 1 {
        return Err(ValidationFailure::invalid(
            "When using Invite to Pay, your flow must have exactly ONE Pay",
        ));
    }

    let sends = nodes_of_kind(graph, NodeKind::SEND).len();
    if sends == 0 {
        return Err(ValidationFailure::invalid(
            "When using Invite to Pay, your flow must have a Send",
        ));
    }
    if sends > 1 {
        return Err(ValidationFailure::invalid(
            "When using Invite to Pay, your flow must have exactly ONE Send. It can select many destinations",
        ));
    }

    if nodes_of_kind(graph, NodeKind::FIND_PROPERTY).is_empty() {
        return Err(ValidationFailure::invalid(
            "When using Invite to Pay, your flow must have a FindProperty",
        ));
    }

    let sets_project_type = nodes_of_kind(graph, NodeKind::CHECKLIST)
        .iter()
        .any(|checklist| checklist.attr_str("fn") == Some(PROJECT_TYPE_FN));
    if !sets_project_type {
        return Err(ValidationFailure::invalid(
            "When using Invite to Pay, your flow must have a Checklist that sets the passport variable \"proposal.projectType\"",
        ));
    }

    Ok(())
}

/// Runs every rule enabled in `config`, stopping at the first failure.
pub fn validate_for_publish(
    graph: &FlowGraph,
    config: &PublishConfig,
) -> Result<(), ValidationFailure> {
    if config.validate_sections {
        validate_sections(graph)?;
    }
    if config.validate_invite_to_pay {
        validate_invite_to_pay(graph)?;
    }
    Ok(())
}
