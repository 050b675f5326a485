//! Shared types used across TenantGrid crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;

/// Label key that turns on sidecar injection for a namespace.
pub const MESH_INJECTION_LABEL: &str = "istio-injection";
/// Label carrying the tenant tier on namespaces and workloads.
pub const TIER_LABEL: &str = "tenantTier";
/// Label carrying the tenant id on siloed namespaces and workloads.
pub const TENANT_LABEL: &str = "tenantId";

// ── Tier ───────────────────────────────────────────────────────────

/// A tenant's subscription class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Advanced,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Advanced, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Advanced => "advanced",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "advanced" => Ok(Tier::Advanced),
            "premium" => Ok(Tier::Premium),
            _ => Err(TenantError::UnsupportedTier {
                tier: s.to_string(),
            }),
        }
    }
}

/// Whether a workload shares its namespace with other tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    Pooled,
    Siloed,
}

// ── Tenant ─────────────────────────────────────────────────────────

/// A validated roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: Option<String>,
    pub tier: Tier,
}

impl Tenant {
    pub fn pooled(tier: Tier) -> Self {
        Self { tenant_id: None, tier }
    }

    pub fn siloed(tenant_id: impl Into<String>, tier: Tier) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            tier,
        }
    }
}

/// Raw roster entry as written in config. The tier stays a string so that
/// unknown values surface as a per-entry rejection instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub tier: String,
}

impl RosterEntry {
    pub fn new(tenant_id: Option<&str>, tier: &str) -> Self {
        Self {
            tenant_id: tenant_id.map(str::to_string),
            tier: tier.to_string(),
        }
    }

    /// Parse the tier and produce a [`Tenant`].
    pub fn to_tenant(&self) -> Result<Tenant, TenantError> {
        let tier: Tier = self.tier.parse()?;
        Ok(Tenant {
            tenant_id: self.tenant_id.clone(),
            tier,
        })
    }
}

/// How a roster entry is referred to in rejection reports.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TenantRef {
    Named { tenant_id: String },
    /// Anonymous pool occupant, identified by its roster position.
    Anonymous { tier: String, index: usize },
}

impl TenantRef {
    pub fn for_entry(index: usize, entry: &RosterEntry) -> Self {
        match &entry.tenant_id {
            Some(id) => TenantRef::Named {
                tenant_id: id.clone(),
            },
            None => TenantRef::Anonymous {
                tier: entry.tier.clone(),
                index,
            },
        }
    }
}

impl fmt::Display for TenantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantRef::Named { tenant_id } => f.write_str(tenant_id),
            TenantRef::Anonymous { tier, index } => write!(f, "{tier}#{index}"),
        }
    }
}

// ── Namespace ──────────────────────────────────────────────────────

/// A compute namespace on the shared cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub tier: Tier,
    pub tenant_id: Option<String>,
    pub isolation_level: PlacementMode,
    pub labels: BTreeMap<String, String>,
}

impl Namespace {
    pub fn new(name: String, tier: Tier, tenant_id: Option<String>, isolation_level: PlacementMode) -> Self {
        let labels = workload_labels(tier, tenant_id.as_deref())
            .into_iter()
            .chain([(MESH_INJECTION_LABEL.to_string(), "enabled".to_string())])
            .collect();
        Self {
            name,
            tier,
            tenant_id,
            isolation_level,
            labels,
        }
    }

    pub fn is_pooled(&self) -> bool {
        self.isolation_level == PlacementMode::Pooled
    }
}

/// Tier and tenant labels stamped on every tenant-owned object.
pub fn workload_labels(tier: Tier, tenant_id: Option<&str>) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(TIER_LABEL.to_string(), tier.to_string());
    if let Some(id) = tenant_id {
        labels.insert(TENANT_LABEL.to_string(), id.to_string());
    }
    labels
}

// ── Sizing ─────────────────────────────────────────────────────────

/// CPU and memory quantities in orchestrator notation ("100m", "250Mi").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuantity {
    pub cpu: String,
    pub memory: String,
}

impl ResourceQuantity {
    pub fn new(cpu: &str, memory: &str) -> Self {
        Self {
            cpu: cpu.to_string(),
            memory: memory.to_string(),
        }
    }
}

/// Autoscaling bounds for queue-driven jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobScaling {
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Messages per replica before another job is started.
    pub queue_length: u32,
    pub polling_interval_secs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Basic".parse::<Tier>().unwrap(), Tier::Basic);
        assert_eq!(" premium ".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!("ADVANCED".parse::<Tier>().unwrap(), Tier::Advanced);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let err = "platinum".parse::<Tier>().unwrap_err();
        assert_eq!(
            err,
            TenantError::UnsupportedTier {
                tier: "platinum".to_string()
            }
        );
    }

    #[test]
    fn namespace_labels_include_tenant_only_when_present() {
        let pooled = Namespace::new("basic-pool".into(), Tier::Basic, None, PlacementMode::Pooled);
        assert_eq!(pooled.labels.get(TIER_LABEL).map(String::as_str), Some("basic"));
        assert!(!pooled.labels.contains_key(TENANT_LABEL));
        assert_eq!(pooled.labels.get(MESH_INJECTION_LABEL).map(String::as_str), Some("enabled"));

        let siloed = Namespace::new(
            "tenant-b".into(),
            Tier::Advanced,
            Some("tenant-b".into()),
            PlacementMode::Siloed,
        );
        assert_eq!(siloed.labels.get(TENANT_LABEL).map(String::as_str), Some("tenant-b"));
        assert!(!siloed.is_pooled());
    }

    #[test]
    fn tenant_ref_display() {
        let named = TenantRef::for_entry(0, &RosterEntry::new(Some("acme"), "premium"));
        let anon = TenantRef::for_entry(3, &RosterEntry::new(None, "basic"));
        assert_eq!(named.to_string(), "acme");
        assert_eq!(anon.to_string(), "basic#3");
    }
}
