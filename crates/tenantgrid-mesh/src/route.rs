//! Routing rules — path prefix plus tenant claim match.
//!
//! A rule for a siloed tenant requires an exact tenant-id claim; a pool's
//! catch-all requires only the tier claim. Claim values are matched with
//! anchored, escaped patterns so `tenant-b` never matches `tenant-bb`.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tenantgrid_core::config::ServiceSpec;
use tenantgrid_core::naming::{service_host, validate_label};
use tenantgrid_core::{Namespace, TenantResult, Tier};

/// Header carrying the tier claim of the verified token.
pub const TIER_CLAIM: &str = "@request.auth.claims.custom:tenant_tier";
/// Header carrying the tenant id claim of the verified token.
pub const TENANT_CLAIM: &str = "@request.auth.claims.custom:tenant_id";

/// Port every service exposes inside the cluster.
pub const SERVICE_PORT: u16 = 80;

/// Claims presented by an authenticated request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    pub tier: Option<String>,
    pub tenant_id: Option<String>,
}

impl Claims {
    pub fn new(tier: &str, tenant_id: Option<&str>) -> Self {
        Self {
            tier: Some(tier.to_string()),
            tenant_id: tenant_id.map(str::to_string),
        }
    }
}

/// Match on tier and, for siloed tenants, tenant id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimPredicate {
    pub tier: Tier,
    pub tenant_id: Option<String>,
}

impl ClaimPredicate {
    pub fn is_catch_all(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Claim header → anchored regex, as handed to the mesh.
    pub fn header_matches(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(TIER_CLAIM.to_string(), exact(self.tier.as_str()));
        if let Some(id) = &self.tenant_id {
            headers.insert(TENANT_CLAIM.to_string(), exact(id));
        }
        headers
    }

    /// Evaluate the predicate the way the mesh would.
    pub fn matches(&self, claims: &Claims) -> bool {
        self.header_matches().iter().all(|(header, pattern)| {
            let value = match header.as_str() {
                TIER_CLAIM => claims.tier.as_deref(),
                TENANT_CLAIM => claims.tenant_id.as_deref(),
                _ => None,
            };
            match (value, Regex::new(pattern)) {
                (Some(v), Ok(re)) => re.is_match(v),
                _ => false,
            }
        })
    }
}

impl fmt::Display for ClaimPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant_id {
            Some(id) => write!(f, "tier={},tenant={id}", self.tier),
            None => write!(f, "tier={}", self.tier),
        }
    }
}

fn exact(value: &str) -> String {
    format!("^{}$", regex::escape(value))
}

/// Backend a rule forwards to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Evaluation class within a prefix. Lower classes are evaluated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePrecedence {
    TenantSpecific,
    TierDefault,
}

/// One ingress route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub name: String,
    /// Namespace of the backing service.
    pub namespace: String,
    pub gateway: String,
    pub host: String,
    pub path_prefix: String,
    pub predicate: ClaimPredicate,
    pub precedence: RoutePrecedence,
    pub destination: Destination,
}

impl RoutingRule {
    pub fn matches(&self, path: &str, claims: &Claims) -> bool {
        path.starts_with(&self.path_prefix) && self.predicate.matches(claims)
    }
}

/// Derives ingress rules for services placed in a namespace.
#[derive(Debug, Clone)]
pub struct RoutingComposer {
    ingress_host: String,
    gateway: String,
}

impl RoutingComposer {
    pub fn new(ingress_host: &str, gateway: &str) -> Self {
        Self {
            ingress_host: ingress_host.to_string(),
            gateway: gateway.to_string(),
        }
    }

    /// Route for `service` in `namespace`, or `None` if the service has no
    /// public path.
    pub fn compose(
        &self,
        service: &ServiceSpec,
        namespace: &Namespace,
    ) -> TenantResult<Option<RoutingRule>> {
        self.compose_in(service, namespace, namespace)
    }

    /// Route matching `tenant`'s claims onto `service` running in `backing`.
    ///
    /// Used when a siloed tenant is served by a pool: the rule lives next to
    /// the pooled service but keeps the tenant's exact predicate.
    pub fn compose_in(
        &self,
        service: &ServiceSpec,
        tenant: &Namespace,
        backing: &Namespace,
    ) -> TenantResult<Option<RoutingRule>> {
        let Some(prefix) = &service.path_prefix else {
            return Ok(None);
        };

        let name = format!("{}-{}", service.name, tenant.name);
        validate_label("route", &name)?;
        let host = service_host(&service.name, &backing.name);
        validate_label("service", &format!("{}-service", service.name))?;

        let predicate = ClaimPredicate {
            tier: tenant.tier,
            tenant_id: tenant.tenant_id.clone(),
        };
        let precedence = if predicate.is_catch_all() {
            RoutePrecedence::TierDefault
        } else {
            RoutePrecedence::TenantSpecific
        };

        debug!(
            route = %name,
            prefix = %prefix,
            predicate = %predicate,
            backing = %backing.name,
            "composed route"
        );

        Ok(Some(RoutingRule {
            name,
            namespace: backing.name.clone(),
            gateway: self.gateway.clone(),
            host: self.ingress_host.clone(),
            path_prefix: prefix.clone(),
            predicate,
            precedence,
            destination: Destination {
                host,
                port: SERVICE_PORT,
            },
        }))
    }
}
