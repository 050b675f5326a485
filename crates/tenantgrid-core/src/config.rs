//! tenantgrid.toml configuration parser.
//!
//! A config carries the tier policy table, the tenant roster, and optionally
//! a service/store catalog. When the catalog is omitted the built-in
//! order/product/fulfillment/invoice application is used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{JobScaling, PlacementMode, ResourceQuantity, RosterEntry, Tier};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantGridConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tiers: BTreeMap<Tier, TierOverride>,
    #[serde(default)]
    pub tenants: Vec<RosterEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stores: Vec<StoreSpec>,
}

/// Cluster-wide policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_version")]
    pub version: semver::Version,
    /// Session tag carrying the caller's tenant id. Empty disables tag scoping.
    #[serde(default = "default_tag_key")]
    pub tenant_tag_key: String,
    #[serde(default = "default_ingress_host")]
    pub ingress_host: String,
    #[serde(default = "default_ingress_gateway")]
    pub ingress_gateway: String,
    /// Prefix for audit log groups fed by observability subscriptions.
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Bus used by tiers whose event bus placement is `shared`.
    #[serde(default = "default_shared_bus")]
    pub shared_event_bus: String,
}

fn default_version() -> semver::Version {
    semver::Version::new(1, 0, 0)
}

fn default_tag_key() -> String {
    "TenantID".to_string()
}

fn default_ingress_host() -> String {
    "saas-workshop.example.com".to_string()
}

fn default_ingress_gateway() -> String {
    "istio-ingress/istio-ingressgateway".to_string()
}

fn default_log_prefix() -> String {
    "/saas-workshop".to_string()
}

fn default_shared_bus() -> String {
    "advanced-tier-event-bus".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            tenant_tag_key: default_tag_key(),
            ingress_host: default_ingress_host(),
            ingress_gateway: default_ingress_gateway(),
            log_prefix: default_log_prefix(),
            shared_event_bus: default_shared_bus(),
        }
    }
}

/// Per-tier overrides of the built-in sizing table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierOverride {
    pub replicas: Option<u32>,
    pub event_bus: Option<BusPlacement>,
    pub requests: Option<ResourceQuantity>,
    pub limits: Option<ResourceQuantity>,
    pub job: Option<JobScaling>,
    /// Service name → where that service runs for the tier's siloed tenants.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, PlacementMode>,
}

/// Where a tier's event bus lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusPlacement {
    /// One bus per namespace (`{namespace}-event-bus`).
    PerNamespace,
    /// One bus shared by every namespace of the tier.
    Shared,
}

// ── Catalog ────────────────────────────────────────────────────────

/// A microservice deployed into every tenant namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default)]
    pub kind: WorkloadKind,
    /// Opaque image reference.
    pub image: String,
    /// Ingress path prefix. Services without one are not routed.
    pub path_prefix: Option<String>,
    #[serde(default = "default_container_port")]
    pub port: u16,
    /// Queue store feeding a queue-driven job.
    pub queue: Option<String>,
    /// Services that must exist before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub data: Vec<DataAccess>,
    pub publishes: Option<EventSource>,
    #[serde(default)]
    pub consumes: Vec<EventSource>,
    /// Per-tier placement for siloed tenants, ahead of the tier policy table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub placement: BTreeMap<Tier, PlacementMode>,
}

impl ServiceSpec {
    /// Publishes to or consumes from an event bus.
    pub fn uses_events(&self) -> bool {
        self.publishes.is_some() || !self.consumes.is_empty()
    }
}

fn default_container_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    #[default]
    Deployment,
    /// Scaled from zero on queue depth.
    QueueJob,
}

/// Actions a service performs against a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAccess {
    pub store: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventSource {
    pub source: String,
    pub detail_type: String,
}

/// A data store referenced by services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    pub name: String,
    pub kind: StoreKind,
    /// `None` means per-namespace for tables and queues, and the tier's bus
    /// placement for event buses.
    pub provisioning: Option<Provisioning>,
    /// Attribute holding the owning tenant id (row leading key, event detail field).
    pub tenant_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Table,
    Queue,
    EventBus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioning {
    PerNamespace,
    Shared,
}

impl StoreSpec {
    /// Effective provisioning under a tier's bus placement.
    pub fn provisioning_for(&self, bus: BusPlacement) -> Provisioning {
        self.provisioning.unwrap_or(match (self.kind, bus) {
            (StoreKind::EventBus, BusPlacement::Shared) => Provisioning::Shared,
            _ => Provisioning::PerNamespace,
        })
    }
}

impl TenantGridConfig {
    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config with one pooled and two siloed tenants.
    pub fn scaffold() -> Self {
        TenantGridConfig {
            policy: PolicyConfig::default(),
            tiers: BTreeMap::new(),
            tenants: vec![
                RosterEntry::new(None, "basic"),
                RosterEntry::new(Some("tenant-b"), "advanced"),
                RosterEntry::new(Some("tenant-c"), "premium"),
            ],
            services: Vec::new(),
            stores: Vec::new(),
        }
    }
}
