//! Route tables — ordered rule lists per gateway, host, and path prefix.
//!
//! Routing engines apply the first matching rule, so order is part of
//! correctness: tenant-specific rules are kept ahead of every tier
//! catch-all sharing their prefix, regardless of insertion order.

use std::collections::BTreeMap;

use tracing::debug;

use tenantgrid_core::{ComposeError, ComposeResult, Tier};

use crate::route::{Claims, RoutePrecedence, RoutingRule};

type TableKey = (String, String, String);

/// Ordered routing rules, grouped by (gateway, host, path prefix).
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    groups: BTreeMap<TableKey, Vec<RoutingRule>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, keeping its group ordered.
    ///
    /// A rule identical in predicate and destination to an existing one is
    /// merged (pooled tenants produce the same rule). The same predicate
    /// pointing at a different destination is an ambiguous route.
    pub fn insert(&mut self, rule: RoutingRule) -> ComposeResult<()> {
        let key = (
            rule.gateway.clone(),
            rule.host.clone(),
            rule.path_prefix.clone(),
        );
        let group = self.groups.entry(key).or_default();

        if let Some(existing) = group.iter().find(|r| r.predicate == rule.predicate) {
            if existing.destination == rule.destination {
                return Ok(());
            }
            return Err(ComposeError::RoutingConflict {
                path_prefix: rule.path_prefix.clone(),
                predicate: rule.predicate.to_string(),
                existing: existing.destination.to_string(),
                conflicting: rule.destination.to_string(),
            });
        }

        debug!(
            route = %rule.name,
            prefix = %rule.path_prefix,
            predicate = %rule.predicate,
            "inserted route"
        );
        group.push(rule);
        group.sort_by(|a, b| order_key(a).cmp(&order_key(b)));
        Ok(())
    }

    /// Rules for one prefix, in evaluation order.
    pub fn rules_for(&self, path_prefix: &str) -> Vec<&RoutingRule> {
        self.groups
            .iter()
            .filter(|((_, _, prefix), _)| prefix == path_prefix)
            .flat_map(|(_, rules)| rules.iter())
            .collect()
    }

    /// Every rule, grouped by prefix, each group in evaluation order.
    pub fn ordered(&self) -> Vec<&RoutingRule> {
        self.groups.values().flatten().collect()
    }

    /// First rule that would serve a request, trying longer prefixes first.
    pub fn resolve(&self, path: &str, claims: &Claims) -> Option<&RoutingRule> {
        let mut candidates: Vec<(&TableKey, &Vec<RoutingRule>)> = self
            .groups
            .iter()
            .filter(|((_, _, prefix), _)| path.starts_with(prefix.as_str()))
            .collect();
        candidates.sort_by(|(a, _), (b, _)| b.2.len().cmp(&a.2.len()).then_with(|| a.cmp(b)));

        candidates
            .into_iter()
            .flat_map(|(_, rules)| rules.iter())
            .find(|rule| rule.predicate.matches(claims))
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn order_key(rule: &RoutingRule) -> (RoutePrecedence, Option<&str>, Tier, &str) {
    (
        rule.precedence,
        rule.predicate.tenant_id.as_deref(),
        rule.predicate.tier,
        rule.name.as_str(),
    )
}
