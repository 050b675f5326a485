//! Graph assembly.
//!
//! A [`TenantPlan`] collects the nodes and edges derived for one roster entry
//! and is merged into the [`DependencyGraphBuilder`] only once the whole entry
//! derived cleanly. Merging deduplicates by node key: the same key with the
//! same definition is one node, the same key with a different definition is
//! a conflict.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use tenantgrid_core::{ComposeError, ComposeResult, ServiceCatalog};

use crate::graph::{DeploymentGraph, find_cycle};
use crate::node::{NodeKey, NodeSpec};

/// Nodes and edges for one roster entry, not yet part of the graph.
#[derive(Debug, Clone, Default)]
pub struct TenantPlan {
    nodes: BTreeMap<NodeKey, NodeSpec>,
    edges: BTreeSet<(NodeKey, NodeKey)>,
}

impl TenantPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its key.
    pub fn add(&mut self, spec: NodeSpec) -> ComposeResult<NodeKey> {
        insert_node(&mut self.nodes, spec)
    }

    /// Record that `from` must exist before `to`.
    pub fn edge(&mut self, from: &NodeKey, to: &NodeKey) {
        self.edges.insert((from.clone(), to.clone()));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.keys()
    }
}

fn insert_node(nodes: &mut BTreeMap<NodeKey, NodeSpec>, spec: NodeSpec) -> ComposeResult<NodeKey> {
    let key = spec.key();
    match nodes.get(&key) {
        Some(existing) if *existing == spec => {}
        Some(_) => {
            warn!(key = %key, "conflicting definitions for one node key");
            return Err(ComposeError::NodeConflict {
                key: key.to_string(),
            });
        }
        None => {
            nodes.insert(key.clone(), spec);
        }
    }
    Ok(key)
}

/// Accumulates tenant plans into one deployment graph.
#[derive(Debug, Default)]
pub struct DependencyGraphBuilder {
    graph: DeploymentGraph,
}

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a plan. On conflict the builder is left unchanged.
    pub fn merge(&mut self, plan: TenantPlan) -> ComposeResult<()> {
        for (key, spec) in &plan.nodes {
            if let Some(existing) = self.graph.node(key) {
                if existing != spec {
                    warn!(key = %key, "conflicting definitions across tenants");
                    return Err(ComposeError::NodeConflict {
                        key: key.to_string(),
                    });
                }
            }
        }

        let before = self.graph.len();
        for (_, spec) in plan.nodes {
            insert_node(self.graph.nodes_mut(), spec)?;
        }
        self.graph.edges_mut().extend(plan.edges);
        debug!(
            added = self.graph.len() - before,
            total = self.graph.len(),
            "merged tenant plan"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Finish the graph, rejecting it if the edges form a cycle.
    pub fn build(self) -> ComposeResult<DeploymentGraph> {
        if let Some(cycle) = self.graph.find_cycle() {
            return Err(ComposeError::DependencyCycle {
                cycle: cycle.iter().map(NodeKey::to_string).collect(),
            });
        }
        Ok(self.graph)
    }
}

/// Reject catalogs whose service dependencies loop.
///
/// The reported path starts and ends at the same service, e.g.
/// `order -> fulfillment -> order`.
pub fn check_service_cycles(catalog: &ServiceCatalog) -> ComposeResult<()> {
    let names: Vec<&str> = catalog.services().map(|s| s.name.as_str()).collect();
    let cycle = find_cycle(&names, |name| {
        catalog
            .service(name)
            .map(|s| s.depends_on.iter().map(String::as_str).collect())
            .unwrap_or_default()
    });

    match cycle {
        Some(path) => {
            let cycle: Vec<String> = path.into_iter().map(str::to_string).collect();
            warn!(cycle = %cycle.join(" -> "), "service dependency cycle");
            Err(ComposeError::DependencyCycle { cycle })
        }
        None => Ok(()),
    }
}
