//! The deployment graph handed to executors.
//!
//! Edges read "must exist before": `(a, b)` means `a` is created first.
//! Ordered collections throughout so serialization is byte-stable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::node::{NodeKey, NodeSpec, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentGraph {
    nodes: BTreeMap<NodeKey, NodeSpec>,
    edges: BTreeSet<(NodeKey, NodeKey)>,
}

impl DeploymentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut BTreeMap<NodeKey, NodeSpec> {
        &mut self.nodes
    }

    pub(crate) fn edges_mut(&mut self) -> &mut BTreeSet<(NodeKey, NodeKey)> {
        &mut self.edges
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeKey, &NodeSpec)> {
        self.nodes.iter()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&NodeSpec> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn edges(&self) -> impl Iterator<Item = &(NodeKey, NodeKey)> {
        self.edges.iter()
    }

    pub fn has_edge(&self, from: &NodeKey, to: &NodeKey) -> bool {
        self.edges.contains(&(from.clone(), to.clone()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes of one kind, in key order.
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = (&NodeKey, &NodeSpec)> {
        self.nodes.iter().filter(move |(k, _)| k.kind == kind)
    }

    /// Nodes that must exist before `key`.
    pub fn dependencies_of(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.edges
            .iter()
            .filter(|(_, to)| to == key)
            .map(|(from, _)| from)
            .collect()
    }

    /// Nodes that wait on `key`.
    pub fn dependents_of(&self, key: &NodeKey) -> Vec<&NodeKey> {
        self.edges
            .iter()
            .filter(|(from, _)| from == key)
            .map(|(_, to)| to)
            .collect()
    }

    /// Layered topological order: every node appears in a wave after all of
    /// its dependencies. Nodes within a wave are independent of each other.
    ///
    /// Nodes on a cycle never become ready and are left out, so a graph is
    /// acyclic exactly when the waves cover every node.
    pub fn apply_waves(&self) -> Vec<Vec<NodeKey>> {
        let mut indegree: BTreeMap<&NodeKey, usize> = self.nodes.keys().map(|k| (k, 0)).collect();
        let mut adjacency: BTreeMap<&NodeKey, Vec<&NodeKey>> = BTreeMap::new();
        for (from, to) in &self.edges {
            adjacency.entry(from).or_default().push(to);
            if let Some(d) = indegree.get_mut(to) {
                *d += 1;
            }
        }

        let mut ready: Vec<&NodeKey> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut waves = Vec::new();

        while !ready.is_empty() {
            let mut next = BTreeSet::new();
            for key in &ready {
                for to in adjacency.get(*key).into_iter().flatten() {
                    if let Some(d) = indegree.get_mut(*to) {
                        *d -= 1;
                        if *d == 0 {
                            next.insert(*to);
                        }
                    }
                }
            }
            waves.push(ready.iter().map(|k| (*k).clone()).collect());
            ready = next.into_iter().collect();
        }

        waves
    }

    pub fn is_acyclic(&self) -> bool {
        self.apply_waves().iter().map(Vec::len).sum::<usize>() == self.nodes.len()
    }

    /// One cycle through the graph, first node repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<NodeKey>> {
        let mut adjacency: BTreeMap<&NodeKey, Vec<&NodeKey>> = BTreeMap::new();
        for (from, to) in &self.edges {
            adjacency.entry(from).or_default().push(to);
        }
        let roots: Vec<&NodeKey> = self.nodes.keys().collect();
        find_cycle(&roots, |k| adjacency.get(k).cloned().unwrap_or_default())
            .map(|path| path.into_iter().cloned().collect())
    }

    /// SHA-256 over the canonical JSON encoding.
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Depth-first search for a back edge. Returns the cycle path with the
/// entry node repeated at the end.
pub(crate) fn find_cycle<'a, T, F>(roots: &[&'a T], mut next: F) -> Option<Vec<&'a T>>
where
    T: Ord + ?Sized,
    F: FnMut(&'a T) -> Vec<&'a T>,
{
    let mut state: BTreeMap<&'a T, Visit> = BTreeMap::new();

    for &root in roots {
        if state.contains_key(root) {
            continue;
        }
        let mut path: Vec<&'a T> = vec![root];
        let mut stack: Vec<std::vec::IntoIter<&'a T>> = vec![next(root).into_iter()];
        state.insert(root, Visit::InProgress);

        while let Some(children) = stack.last_mut() {
            match children.next() {
                Some(child) => match state.get(child) {
                    Some(Visit::InProgress) => {
                        let start = path.iter().position(|n| *n == child).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(child);
                        return Some(cycle);
                    }
                    Some(Visit::Done) => {}
                    None => {
                        state.insert(child, Visit::InProgress);
                        path.push(child);
                        stack.push(next(child).into_iter());
                    }
                },
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        state.insert(done, Visit::Done);
                    }
                }
            }
        }
    }

    None
}
