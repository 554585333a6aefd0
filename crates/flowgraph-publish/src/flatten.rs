//! External portal resolution.
//!
//! Flattening turns a flow that references other flows through external
//! portals into one self-contained graph. It runs in two phases:
//!
//! 1. **Fetch**: breadth-first over portal targets, every referenced flow is
//!    read from the store exactly once per call (latest published snapshot,
//!    or draft in preview mode).
//! 2. **Splice**: depth-first from the root flow, each referenced flow is
//!    flattened once (memoized) and then copied under every portal pointing
//!    at it. Copies are re-namespaced as `"{portal}{sep}{original}"`, so two
//!    portals to the same source yield identical but disjoint subgraphs and
//!    republishing an unchanged flow yields an identical result.
//!
//! Cross-flow cycles are detected with the list of flows on the current
//! resolution path.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::{debug, info};

use flowgraph_core::{FlowGraph, GraphError, NodeId, NodeKind, NodeMap, Provenance, ROOT_NODE_KEY};
use flowgraph_storage::{FlowId, FlowStore, PublishedSnapshots};

use crate::config::PublishConfig;
use crate::error::FlattenError;

/// Set on a portal node that was converted from an external portal.
pub const ATTR_FLATTENED_FROM_PORTAL: &str = "flattenedFromExternalPortal";
/// Published version of the flow spliced under a converted portal.
pub const ATTR_PUBLISHED_VERSION: &str = "publishedVersion";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Read portal targets from their drafts instead of their latest
    /// published snapshots (editor preview).
    pub draft_only: bool,
}

/// Result of a flatten call.
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub graph: FlowGraph,
    /// Every flow spliced in, with the published version that was used
    /// (`None` when read from a draft).
    pub sources: BTreeMap<FlowId, Option<u64>>,
}

/// Loads the draft of `root` and flattens it.
pub async fn flatten<S>(
    store: &S,
    root: &FlowId,
    config: &PublishConfig,
    options: FlattenOptions,
) -> Result<Flattened, FlattenError>
where
    S: FlowStore + PublishedSnapshots + ?Sized,
{
    let graph = store.load(root).await?;
    flatten_graph(store, root, graph, config, options).await
}

/// Flattens `graph`, the current content of flow `root`.
pub async fn flatten_graph<S>(
    store: &S,
    root: &FlowId,
    graph: FlowGraph,
    config: &PublishConfig,
    options: FlattenOptions,
) -> Result<Flattened, FlattenError>
where
    S: FlowStore + PublishedSnapshots + ?Sized,
{
    let sources = fetch_sources(store, root, &graph, config, options).await?;

    let (graph, _) = Resolver {
        sources: &sources,
        separator: &config.namespace_separator,
        limit: config.max_portal_depth,
        resolved: HashMap::new(),
        path: vec![root.clone()],
    }
    .resolve(graph)?;

    // Section placement is checked by publish validation.
    graph.check_references()?;
    graph.check_acyclic()?;

    info!(
        flow = %root,
        portals = sources.len(),
        nodes = graph.node_count(),
        "flattened flow"
    );

    Ok(Flattened {
        graph,
        sources: sources
            .into_iter()
            .map(|(flow, source)| (flow, source.version))
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Fetch phase
// ---------------------------------------------------------------------------

struct Source {
    graph: FlowGraph,
    version: Option<u64>,
}

/// External portals of `graph` in depth-first order, with their targets.
///
/// Portals unreachable from `_root` come last; they are still resolved.
fn portal_targets(graph: &FlowGraph) -> Result<Vec<(NodeId, FlowId)>, FlattenError> {
    let portals: Vec<&NodeId> = graph
        .iter()
        .filter(|(_, record)| record.is_external_portal())
        .map(|(id, _)| id)
        .collect();

    graph
        .sort_depth_first(portals)
        .into_iter()
        .map(|id| {
            let target = graph
                .get(id.as_str())
                .and_then(|record| record.portal_target())
                .filter(|target| !target.is_empty())
                .map(FlowId::from);
            match target {
                Some(flow) => Ok((id, flow)),
                None => Err(FlattenError::MissingPortalTarget { node: id }),
            }
        })
        .collect()
}

async fn fetch_sources<S>(
    store: &S,
    root: &FlowId,
    graph: &FlowGraph,
    config: &PublishConfig,
    options: FlattenOptions,
) -> Result<HashMap<FlowId, Source>, FlattenError>
where
    S: FlowStore + PublishedSnapshots + ?Sized,
{
    let mut sources: HashMap<FlowId, Source> = HashMap::new();
    let mut queue: VecDeque<(FlowId, NodeId, usize)> = portal_targets(graph)?
        .into_iter()
        .map(|(node, flow)| (flow, node, 1))
        .collect();

    while let Some((flow, node, depth)) = queue.pop_front() {
        // The root is on every resolution path; referencing it is a cycle
        // the splice phase reports.
        if flow == *root || sources.contains_key(&flow) {
            continue;
        }
        if depth > config.max_portal_depth {
            return Err(FlattenError::PortalDepthExceeded {
                flow,
                limit: config.max_portal_depth,
            });
        }

        let source = if options.draft_only {
            Source {
                graph: store.load(&flow).await?,
                version: None,
            }
        } else {
            match store.fetch_latest_published(&flow).await? {
                Some(published) => Source {
                    graph: published.graph,
                    version: Some(published.version),
                },
                None => return Err(FlattenError::UnpublishedPortal { node, flow }),
            }
        };
        debug!(flow = %flow, depth, version = ?source.version, "fetched portal source");

        for (inner, target) in portal_targets(&source.graph)? {
            queue.push_back((target, inner, depth + 1));
        }
        sources.insert(flow, source);
    }

    Ok(sources)
}

// ---------------------------------------------------------------------------
// Splice phase
// ---------------------------------------------------------------------------

struct Resolved {
    graph: FlowGraph,
    /// Deepest portal nesting inside this flow; 0 without portals.
    height: usize,
}

struct Resolver<'a> {
    sources: &'a HashMap<FlowId, Source>,
    separator: &'a str,
    limit: usize,
    resolved: HashMap<FlowId, Resolved>,
    path: Vec<FlowId>,
}

impl Resolver<'_> {
    /// Splices every external portal of `graph`, the flow at the end of
    /// `path`. Returns the flattened graph and its nesting height.
    fn resolve(&mut self, graph: FlowGraph) -> Result<(FlowGraph, usize), FlattenError> {
        let portals = portal_targets(&graph)?;
        if portals.is_empty() {
            return Ok((graph, 0));
        }

        let depth = self.path.len();
        let mut height = 0;
        let mut nodes = graph.into_nodes();

        for (portal, target) in portals {
            if self.path.contains(&target) {
                let mut path = self.path.clone();
                path.push(target);
                return Err(FlattenError::PortalCycle { path });
            }

            let sub_height = self.resolve_flow(&portal, &target)?;
            if depth + sub_height > self.limit {
                return Err(FlattenError::PortalDepthExceeded {
                    flow: target,
                    limit: self.limit,
                });
            }
            height = height.max(sub_height + 1);

            let version = self.sources.get(&target).and_then(|source| source.version);
            if let Some(resolved) = self.resolved.get(&target) {
                splice(&mut nodes, &portal, &target, &resolved.graph, version, self.separator)?;
            }
        }

        Ok((FlowGraph::from_nodes(nodes), height))
    }

    /// Flattens `flow` once and caches the result.
    fn resolve_flow(&mut self, portal: &NodeId, flow: &FlowId) -> Result<usize, FlattenError> {
        if let Some(resolved) = self.resolved.get(flow) {
            return Ok(resolved.height);
        }
        let sources = self.sources;
        let source = sources
            .get(flow)
            .ok_or_else(|| FlattenError::UnpublishedPortal {
                node: portal.clone(),
                flow: flow.clone(),
            })?;

        self.path.push(flow.clone());
        let result = self.resolve(source.graph.clone());
        self.path.pop();

        let (graph, height) = result?;
        self.resolved.insert(flow.clone(), Resolved { graph, height });
        Ok(height)
    }
}

/// Copies `source` under `portal` and converts the portal node.
fn splice(
    nodes: &mut NodeMap,
    portal: &NodeId,
    flow: &FlowId,
    source: &FlowGraph,
    version: Option<u64>,
    separator: &str,
) -> Result<(), FlattenError> {
    for (id, record) in source.iter() {
        if id.is_root() {
            continue;
        }
        let scoped = id.scoped(portal, separator);
        if nodes.contains_key(&scoped) {
            return Err(GraphError::DuplicateNode { id: scoped }.into());
        }

        let mut copy = record.clone();
        copy.children = record
            .children
            .iter()
            .map(|child| child.scoped(portal, separator))
            .collect();
        // Nodes imported from deeper flows keep their original provenance.
        if copy.provenance.is_none() {
            copy.provenance = Some(Provenance {
                source_flow: flow.to_string(),
                source_node: id.clone(),
            });
        }
        nodes.insert(scoped, copy);
    }

    let node = nodes
        .get_mut(portal)
        .ok_or_else(|| GraphError::NodeNotFound { id: portal.clone() })?;
    node.kind = Some(NodeKind::INTERNAL_PORTAL);
    node.children = source
        .children(ROOT_NODE_KEY)
        .iter()
        .map(|child| child.scoped(portal, separator))
        .collect();
    node.attributes
        .insert(ATTR_FLATTENED_FROM_PORTAL.to_string(), true.into());
    if let Some(version) = version {
        node.attributes
            .insert(ATTR_PUBLISHED_VERSION.to_string(), version.into());
    }

    debug!(portal = %portal, flow = %flow, "spliced portal");
    Ok(())
}
