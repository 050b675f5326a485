//! Graph nodes, one per resource the executor creates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use tenantgrid_core::config::WorkloadKind;
use tenantgrid_core::{JobScaling, Namespace, ResourceQuantity};
use tenantgrid_isolation::{AccessGrant, EventSubscription, ServiceIdentity, StoreRef};
use tenantgrid_mesh::RoutingRule;

/// Namespace segment of keys for cluster-scoped resources.
pub const CLUSTER_SCOPE: &str = "_cluster";

/// Port the token-vendor sidecar listens on inside every pod.
pub const SIDECAR_PORT: u16 = 8081;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    NamespacePolicy,
    DataStore,
    ServiceAccount,
    AccessGrant,
    Workload,
    RoutingRule,
    EventSubscription,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Namespace,
        ResourceKind::NamespacePolicy,
        ResourceKind::DataStore,
        ResourceKind::ServiceAccount,
        ResourceKind::AccessGrant,
        ResourceKind::Workload,
        ResourceKind::RoutingRule,
        ResourceKind::EventSubscription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::NamespacePolicy => "namespace-policy",
            ResourceKind::DataStore => "data-store",
            ResourceKind::ServiceAccount => "service-account",
            ResourceKind::AccessGrant => "access-grant",
            ResourceKind::Workload => "workload",
            ResourceKind::RoutingRule => "routing-rule",
            ResourceKind::EventSubscription => "event-subscription",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown resource kind {s:?}"))
    }
}

// ── NodeKey ────────────────────────────────────────────────────────

/// Deterministic identity of a node: `kind/namespace/name`.
///
/// Two runs that derive the same logical resource derive the same key, which
/// is what lets pooled resources deduplicate regardless of roster order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl NodeKey {
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.unwrap_or(CLUSTER_SCOPE).to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace == CLUSTER_SCOPE
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

impl From<NodeKey> for String {
    fn from(key: NodeKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for NodeKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut parts = value.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(namespace), Some(name)) if !name.is_empty() => Ok(NodeKey {
                kind: kind.parse()?,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
            _ => Err(format!("malformed node key {value:?}")),
        }
    }
}

// ── Node definitions ───────────────────────────────────────────────

/// Mesh filter installed per namespace ahead of any workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyFilter {
    /// Proxy cluster letting the mesh reach the sidecar on localhost.
    SidecarCluster { port: u16 },
    /// External authorization of inbound requests through the sidecar.
    ExternalAuthz {
        port: u16,
        path_prefix: String,
        /// Workloads carrying this label are authorized.
        selector: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePolicy {
    pub name: String,
    pub namespace: String,
    pub filter: PolicyFilter,
}

impl NamespacePolicy {
    pub fn sidecar_localhost(namespace: &str) -> Self {
        Self {
            name: "sidecar-localhost".to_string(),
            namespace: namespace.to_string(),
            filter: PolicyFilter::SidecarCluster { port: SIDECAR_PORT },
        }
    }

    pub fn auth_filter(namespace: &str) -> Self {
        let selector = BTreeMap::from([("authorization".to_string(), "enabled".to_string())]);
        Self {
            name: "auth-filter".to_string(),
            namespace: namespace.to_string(),
            filter: PolicyFilter::ExternalAuthz {
                port: SIDECAR_PORT,
                path_prefix: "/authorize".to_string(),
                selector,
            },
        }
    }
}

/// A deployment or queue-driven job running one catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub service: String,
    pub kind: WorkloadKind,
    pub image: String,
    pub service_account: String,
    pub port: u16,
    /// Zero for jobs; scaling bounds live in `job`.
    pub replicas: u32,
    pub requests: ResourceQuantity,
    pub limits: ResourceQuantity,
    pub sidecar: ResourceQuantity,
    pub job: Option<JobScaling>,
    pub labels: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum NodeSpec {
    Namespace(Namespace),
    NamespacePolicy(NamespacePolicy),
    DataStore(StoreRef),
    ServiceAccount(ServiceIdentity),
    AccessGrant(AccessGrant),
    Workload(Workload),
    RoutingRule(RoutingRule),
    EventSubscription(EventSubscription),
}

impl NodeSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            NodeSpec::Namespace(_) => ResourceKind::Namespace,
            NodeSpec::NamespacePolicy(_) => ResourceKind::NamespacePolicy,
            NodeSpec::DataStore(_) => ResourceKind::DataStore,
            NodeSpec::ServiceAccount(_) => ResourceKind::ServiceAccount,
            NodeSpec::AccessGrant(_) => ResourceKind::AccessGrant,
            NodeSpec::Workload(_) => ResourceKind::Workload,
            NodeSpec::RoutingRule(_) => ResourceKind::RoutingRule,
            NodeSpec::EventSubscription(_) => ResourceKind::EventSubscription,
        }
    }

    pub fn key(&self) -> NodeKey {
        let kind = self.kind();
        match self {
            NodeSpec::Namespace(ns) => NodeKey::new(kind, None, &ns.name),
            NodeSpec::NamespacePolicy(p) => NodeKey::new(kind, Some(&p.namespace), &p.name),
            NodeSpec::DataStore(s) => NodeKey::new(kind, s.namespace.as_deref(), &s.physical_name),
            NodeSpec::ServiceAccount(sa) => NodeKey::new(kind, Some(&sa.namespace), &sa.name),
            NodeSpec::AccessGrant(g) => NodeKey::new(kind, Some(&g.namespace), &g.name),
            NodeSpec::Workload(w) => NodeKey::new(kind, Some(&w.namespace), &w.name),
            NodeSpec::RoutingRule(r) => NodeKey::new(kind, Some(&r.namespace), &r.name),
            NodeSpec::EventSubscription(e) => NodeKey::new(kind, e.namespace.as_deref(), &e.name),
        }
    }
}
