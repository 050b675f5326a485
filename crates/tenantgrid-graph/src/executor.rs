//! Executor seam — applies a deployment graph to real infrastructure.
//!
//! Executors own apply, retry, and rollback. The composer only guarantees
//! that the same roster always yields the same graph, so a failed subgraph
//! can be retried without recomposing.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graph::DeploymentGraph;
use crate::node::{NodeKey, NodeSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Would be applied; nothing was changed.
    Planned,
    Applied,
    Failed { reason: String },
    /// Not attempted because a dependency did not apply.
    Skipped { blocked_by: String },
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Planned | NodeOutcome::Applied)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub waves: usize,
    pub outcomes: BTreeMap<NodeKey, NodeOutcome>,
}

impl ApplyReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &NodeKey> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_success())
            .map(|(k, _)| k)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&NodeKey, &NodeOutcome)> {
        self.outcomes.iter().filter(|(_, o)| !o.is_success())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(NodeOutcome::is_success)
    }
}

pub trait ResourceGraphExecutor {
    fn apply(&mut self, graph: &DeploymentGraph) -> ApplyReport;
}

/// Walk the graph wave by wave, calling `apply` for each node whose
/// dependencies all succeeded. Dependents of a failed node are skipped.
pub fn apply_in_waves<F>(graph: &DeploymentGraph, mut apply: F) -> ApplyReport
where
    F: FnMut(&NodeKey, &NodeSpec) -> Result<NodeOutcome, String>,
{
    let waves = graph.apply_waves();
    let mut report = ApplyReport {
        waves: waves.len(),
        outcomes: BTreeMap::new(),
    };
    let mut broken: BTreeSet<NodeKey> = BTreeSet::new();

    for (index, wave) in waves.iter().enumerate() {
        debug!(wave = index, nodes = wave.len(), "applying wave");
        for key in wave {
            let blocked_by = graph
                .dependencies_of(key)
                .into_iter()
                .find(|dep| broken.contains(*dep));
            let outcome = match (blocked_by, graph.node(key)) {
                (Some(dep), _) => NodeOutcome::Skipped {
                    blocked_by: dep.to_string(),
                },
                (None, Some(spec)) => match apply(key, spec) {
                    Ok(outcome) => outcome,
                    Err(reason) => {
                        warn!(node = %key, %reason, "node failed to apply");
                        NodeOutcome::Failed { reason }
                    }
                },
                (None, None) => continue,
            };
            if !outcome.is_success() {
                broken.insert(key.clone());
            }
            report.outcomes.insert(key.clone(), outcome);
        }
    }

    report
}

/// Logs the apply order and reports every node as planned.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

impl ResourceGraphExecutor for DryRunExecutor {
    fn apply(&mut self, graph: &DeploymentGraph) -> ApplyReport {
        let report = apply_in_waves(graph, |key, spec| {
            debug!(node = %key, kind = %spec.kind(), "would apply");
            Ok(NodeOutcome::Planned)
        });
        info!(nodes = report.outcomes.len(), waves = report.waves, "dry run complete");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::compose;
    use crate::node::ResourceKind;
    use tenantgrid_core::TenantGridConfig;

    #[test]
    fn dry_run_plans_every_node() {
        let graph = compose(&TenantGridConfig::scaffold()).unwrap().graph;
        let report = DryRunExecutor.apply(&graph);
        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), graph.len());
        assert!(report.waves > 1);
    }

    #[test]
    fn failed_namespace_skips_its_dependents() {
        let graph = compose(&TenantGridConfig::scaffold()).unwrap().graph;
        let report = apply_in_waves(&graph, |key, _| {
            if key.kind == ResourceKind::Namespace && key.name == "tenant-b" {
                Err("quota exceeded".to_string())
            } else {
                Ok(NodeOutcome::Applied)
            }
        });

        assert!(!report.is_success());
        let sa = NodeKey::new(ResourceKind::ServiceAccount, Some("tenant-b"), "fulfillment-service-account");
        assert!(matches!(report.outcomes[&sa], NodeOutcome::Skipped { .. }));
        let other = NodeKey::new(ResourceKind::ServiceAccount, Some("tenant-c"), "order-service-account");
        assert_eq!(report.outcomes[&other], NodeOutcome::Applied);
        assert_eq!(
            report.failed().filter(|(_, o)| matches!(o, NodeOutcome::Failed { .. })).count(),
            1
        );
    }
}
