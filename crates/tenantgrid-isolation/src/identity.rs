//! Workload identity and least-privilege access grants.
//!
//! Every grant on a store that more than one tenant can reach is gated by a
//! session-tag condition: the caller's tenant tag must equal the tenant key
//! of the row, message, or event being accessed. A grant that would need
//! such a gate but has no way to express it fails the whole composition.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tenantgrid_core::config::{ServiceSpec, WorkloadKind};
use tenantgrid_core::naming::validate_label;
use tenantgrid_core::{ComposeError, DeriveResult, Namespace, ServiceCatalog};
use tenantgrid_placement::TierResolution;

use crate::stores::{StoreRef, resolve_store};

/// Action the workload role must be allowed to call with a tenant tag.
pub const TAG_SESSION_ACTION: &str = "sts:TagSession";

/// Service account a workload runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub namespace: String,
    /// Present when workloads assume a tenant-tagged session.
    pub trust: Option<TrustStatement>,
}

impl ServiceIdentity {
    pub fn principal(&self) -> String {
        format!("system:serviceaccount:{}:{}", self.namespace, self.name)
    }
}

/// Allows the identity to tag its session with a tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustStatement {
    pub action: String,
    pub request_tag: String,
}

/// Row-level gate on a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantCondition {
    /// `attribute` of the accessed item must equal the caller's `principal_tag`.
    TenantTag {
        attribute: String,
        principal_tag: String,
    },
    /// The store exists for this tenant only.
    DedicatedResource { tenant_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub name: String,
    pub namespace: String,
    pub principal: String,
    pub actions: Vec<String>,
    pub resource: StoreRef,
    pub condition: GrantCondition,
}

/// Identity plus grants for one service in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub identity: ServiceIdentity,
    pub grants: Vec<AccessGrant>,
}

pub struct IdentityBinder<'a> {
    catalog: &'a ServiceCatalog,
    shared_bus: String,
}

impl<'a> IdentityBinder<'a> {
    pub fn new(catalog: &'a ServiceCatalog, shared_bus: &str) -> Self {
        Self {
            catalog,
            shared_bus: shared_bus.to_string(),
        }
    }

    pub fn bind(
        &self,
        service: &ServiceSpec,
        namespace: &Namespace,
        resolution: &TierResolution,
    ) -> DeriveResult<Binding> {
        let isolation = &resolution.isolation;
        let name = match service.kind {
            WorkloadKind::Deployment => format!("{}-service-account", service.name),
            WorkloadKind::QueueJob => format!("{}-{}-service-account", namespace.name, service.name),
        };
        validate_label("service account", &name)?;

        let identity = ServiceIdentity {
            name,
            namespace: namespace.name.clone(),
            trust: isolation.tag_key.as_ref().map(|tag| TrustStatement {
                action: TAG_SESSION_ACTION.to_string(),
                request_tag: format!("aws:RequestTag/{tag}"),
            }),
        };

        let mut grants = Vec::with_capacity(service.data.len());
        for access in &service.data {
            let spec = self.catalog.store(&access.store).ok_or_else(|| {
                ComposeError::UnknownDependency {
                    service: service.name.clone(),
                    dependency: format!("store {}", access.store),
                }
            })?;
            let resource = resolve_store(spec, namespace, resolution.event_bus, &self.shared_bus);

            let condition = match (resource.is_shared_in(namespace), &namespace.tenant_id) {
                (false, Some(tenant_id)) => GrantCondition::DedicatedResource {
                    tenant_id: tenant_id.clone(),
                },
                _ => self.tag_condition(service, &resource, isolation.tag_key.as_deref())?,
            };

            debug!(
                service = %service.name,
                namespace = %namespace.name,
                store = %resource.physical_name,
                ?condition,
                "bound access grant"
            );

            grants.push(AccessGrant {
                name: format!("{}-{}-access", service.name, access.store),
                namespace: namespace.name.clone(),
                principal: identity.principal(),
                actions: access.actions.clone(),
                resource,
                condition,
            });
        }

        Ok(Binding { identity, grants })
    }

    fn tag_condition(
        &self,
        service: &ServiceSpec,
        resource: &StoreRef,
        tag_key: Option<&str>,
    ) -> Result<GrantCondition, ComposeError> {
        let missing = |reason: &str| {
            warn!(
                service = %service.name,
                store = %resource.store,
                reason,
                "refusing to emit an ungated grant on a shared store"
            );
            ComposeError::MissingIsolationBinding {
                service: service.name.clone(),
                store: resource.store.clone(),
                reason: reason.to_string(),
            }
        };

        let Some(principal_tag) = tag_key else {
            return Err(missing("policy defines no tenant session tag"));
        };
        let Some(attribute) = &resource.tenant_key else {
            return Err(missing("store declares no tenant key"));
        };

        Ok(GrantCondition::TenantTag {
            attribute: attribute.clone(),
            principal_tag: principal_tag.to_string(),
        })
    }
}
