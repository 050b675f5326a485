//! Differences between two deployment graphs, for dry runs and reviews.

use std::fmt;

use serde::Serialize;

use crate::graph::DeploymentGraph;
use crate::node::NodeKey;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphDiff {
    pub added: Vec<NodeKey>,
    pub removed: Vec<NodeKey>,
    /// Same key, different definition.
    pub changed: Vec<NodeKey>,
    pub edges_added: usize,
    pub edges_removed: usize,
}

impl GraphDiff {
    pub fn between(previous: &DeploymentGraph, next: &DeploymentGraph) -> Self {
        let mut diff = GraphDiff::default();

        for (key, spec) in next.nodes() {
            match previous.node(key) {
                None => diff.added.push(key.clone()),
                Some(old) if old != spec => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .nodes()
            .filter(|(key, _)| !next.contains(key))
            .map(|(key, _)| key.clone())
            .collect();

        diff.edges_added = next
            .edges()
            .filter(|(from, to)| !previous.has_edge(from, to))
            .count();
        diff.edges_removed = previous
            .edges()
            .filter(|(from, to)| !next.has_edge(from, to))
            .count();

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.edges_added == 0
            && self.edges_removed == 0
    }
}

impl fmt::Display for GraphDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no changes");
        }
        for key in &self.added {
            writeln!(f, "+ {key}")?;
        }
        for key in &self.changed {
            writeln!(f, "~ {key}")?;
        }
        for key in &self.removed {
            writeln!(f, "- {key}")?;
        }
        writeln!(
            f,
            "{} added, {} changed, {} removed ({} edges added, {} removed)",
            self.added.len(),
            self.changed.len(),
            self.removed.len(),
            self.edges_added,
            self.edges_removed
        )
    }
}
