//! PublishService and TemplateRefresh: the coordinators between storage
//! and the flatten, validate, diff and merge steps.
//!
//! Both hold their collaborators behind an `Arc` so one backend can serve
//! many concurrent callers.

use std::sync::Arc;

use tracing::{info, warn};

use flowgraph_core::FlowGraph;
use flowgraph_storage::{
    FlowId, FlowStore, NewPublish, PublishedFlow, PublishedSnapshots, RefreshScheduler,
    TemplateRegistry,
};

use crate::config::PublishConfig;
use crate::diff::{publish_diff, AlteredNode, DiffOutcome, FlowDelta};
use crate::error::PublishError;
use crate::flatten::{flatten, FlattenOptions, Flattened};
use crate::merge::{merge, MergeReport};
use crate::validate::validate_for_publish;

/// Result of a publish request.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// The flattened flow matches the latest snapshot; nothing was recorded.
    NoChanges,
    Published {
        snapshot: PublishedFlow,
        delta: FlowDelta,
        altered: Vec<AlteredNode>,
        /// Templated flows handed to the refresh scheduler.
        scheduled: Vec<FlowId>,
    },
}

impl PublishOutcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, PublishOutcome::NoChanges)
    }
}

/// Publishes drafts as flattened, validated snapshots.
pub struct PublishService<S> {
    store: Arc<S>,
    config: PublishConfig,
}

impl<S> PublishService<S>
where
    S: FlowStore + PublishedSnapshots + TemplateRegistry + RefreshScheduler,
{
    pub fn new(store: Arc<S>, config: PublishConfig) -> Self {
        PublishService { store, config }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Flattens the draft with portals read from drafts too, for previews.
    /// Nothing is validated or recorded.
    pub async fn preview(&self, flow: &FlowId) -> Result<FlowGraph, PublishError> {
        let options = FlattenOptions { draft_only: true };
        let flattened = flatten(self.store.as_ref(), flow, &self.config, options).await?;
        Ok(flattened.graph)
    }

    /// Flattens, validates and diffs the draft of `flow` against its latest
    /// snapshot without recording anything.
    pub async fn check(&self, flow: &FlowId) -> Result<(Flattened, DiffOutcome), PublishError> {
        let flattened = flatten(
            self.store.as_ref(),
            flow,
            &self.config,
            FlattenOptions::default(),
        )
        .await?;
        validate_for_publish(&flattened.graph, &self.config)?;

        let previous = self.store.fetch_latest_published(flow).await?;
        let outcome = publish_diff(
            previous.as_ref().map(|snapshot| &snapshot.graph),
            &flattened.graph,
        );
        Ok((flattened, outcome))
    }

    /// Publishes the draft of `flow`.
    ///
    /// Runs flatten, validate and diff; an unchanged flow is a no-op. When
    /// `flow` is the source template of other flows they are handed to the
    /// refresh scheduler after the snapshot is recorded.
    pub async fn publish(
        &self,
        flow: &FlowId,
        publisher: &str,
        summary: Option<String>,
    ) -> Result<PublishOutcome, PublishError> {
        let (flattened, outcome) = self.check(flow).await?;
        let DiffOutcome::Changes {
            delta,
            altered,
            facts,
        } = outcome
        else {
            info!(flow = %flow, "no new changes to publish");
            return Ok(PublishOutcome::NoChanges);
        };

        let snapshot = self
            .store
            .record_published(NewPublish {
                flow_id: flow.clone(),
                graph: flattened.graph,
                publisher: publisher.to_string(),
                summary,
                facts,
            })
            .await?;
        info!(
            flow = %flow,
            version = snapshot.version,
            publisher,
            added = delta.added.len(),
            removed = delta.removed.len(),
            modified = delta.modified.len(),
            "published flow"
        );

        let scheduled = self.store.templated_flows(flow).await?;
        if !scheduled.is_empty() {
            self.store.schedule(flow, &scheduled).await?;
            info!(template = %flow, flows = scheduled.len(), "scheduled templated flow refresh");
        }

        Ok(PublishOutcome::Published {
            snapshot,
            delta,
            altered,
            scheduled,
        })
    }
}

/// Rebuilds templated flows from their source template's latest snapshot.
pub struct TemplateRefresh<S> {
    store: Arc<S>,
}

impl<S> TemplateRefresh<S>
where
    S: FlowStore + PublishedSnapshots + TemplateRegistry,
{
    pub fn new(store: Arc<S>) -> Self {
        TemplateRefresh { store }
    }

    /// Merges the edits of `flow` over its template's latest published
    /// snapshot and saves the result as the new draft of `flow`.
    ///
    /// Nothing is saved when the merged graph breaks a structural invariant.
    pub async fn refresh(&self, flow: &FlowId) -> Result<MergeReport, PublishError> {
        let template = self
            .store
            .template_of(flow)
            .await?
            .ok_or_else(|| PublishError::NotTemplated { flow: flow.clone() })?;
        let source = self
            .store
            .fetch_latest_published(&template)
            .await?
            .ok_or_else(|| PublishError::TemplateNotPublished {
                template: template.clone(),
            })?;

        let edits = self.store.templated_edits(flow).await?;
        edits.check_references(&source.graph)?;
        let (merged, report) = merge(&source.graph, &edits);
        merged.validate()?;
        self.store.save(flow, &merged).await?;

        if !report.orphans.is_empty() {
            warn!(flow = %flow, orphans = ?report.orphans, "merged flow has unreachable nodes");
        }
        if !report.missing_required.is_empty() {
            warn!(
                flow = %flow,
                nodes = ?report.missing_required,
                "templated nodes still need instructions"
            );
        }
        info!(
            flow = %flow,
            template = %template,
            version = source.version,
            edits = edits.len(),
            "refreshed templated flow"
        );
        Ok(report)
    }

    /// Refreshes each flow in turn, collecting per-flow results.
    pub async fn refresh_all(
        &self,
        flows: &[FlowId],
    ) -> Vec<(FlowId, Result<MergeReport, PublishError>)> {
        let mut results = Vec::with_capacity(flows.len());
        for flow in flows {
            let result = self.refresh(flow).await;
            if let Err(err) = &result {
                warn!(flow = %flow, error = %err, "templated flow refresh failed");
            }
            results.push((flow.clone(), result));
        }
        results
    }
}
