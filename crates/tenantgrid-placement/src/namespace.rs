//! Namespace allocation.
//!
//! Pooled tenants of a tier share `{tier}-pool`; siloed tenants get a
//! namespace named after their tenant id. The allocator remembers which
//! (tier, tenant) pair owns each name so that two roster entries can never
//! end up in the same namespace by accident.

use std::collections::BTreeMap;

use tracing::debug;

use tenantgrid_core::naming::validate_label;
use tenantgrid_core::{Namespace, TenantError, TenantResult, Tier};

use crate::policy::PlacementRule;

/// Deterministic namespace name for a (tier, tenant) pair.
pub fn namespace_name(tier: Tier, tenant_id: Option<&str>) -> String {
    match tenant_id {
        Some(id) => id.to_string(),
        None => pool_name(tier),
    }
}

fn pool_name(tier: Tier) -> String {
    format!("{tier}-pool")
}

/// Tracks namespace ownership across one composition run.
#[derive(Debug, Default)]
pub struct NamespaceAllocator {
    owners: BTreeMap<String, (Tier, Option<String>)>,
}

impl NamespaceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the namespace for a tenant without claiming it.
    ///
    /// Fails when the name is malformed or too long, when the tier requires a
    /// tenant id that is missing, or when the name already belongs to a
    /// different (tier, tenant) pair. Re-allocating the same pair is allowed.
    pub fn allocate(&self, tier: Tier, tenant_id: Option<&str>) -> TenantResult<Namespace> {
        let rule = PlacementRule::for_tier(tier);
        if rule == PlacementRule::AlwaysSiloed && tenant_id.is_none() {
            return Err(TenantError::MissingTenantId { tier });
        }

        let name = namespace_name(tier, tenant_id);
        validate_label("namespace", &name)?;

        if tenant_id.is_some() {
            // Tenant ids may not shadow any tier's pool.
            if let Some(pool_tier) = Tier::ALL.into_iter().find(|t| pool_name(*t) == name) {
                return Err(TenantError::NamespaceCollision {
                    namespace: name,
                    claimed_by: format!("{pool_tier} pool"),
                });
            }
        }

        if let Some((owner_tier, owner_id)) = self.owners.get(&name) {
            if *owner_tier != tier || owner_id.as_deref() != tenant_id {
                return Err(TenantError::NamespaceCollision {
                    namespace: name,
                    claimed_by: describe_owner(*owner_tier, owner_id.as_deref()),
                });
            }
        }

        let mode = rule.placement(tenant_id);
        debug!(namespace = %name, tier = %tier, ?mode, "allocated namespace");
        Ok(Namespace::new(name, tier, tenant_id.map(str::to_string), mode))
    }

    /// Record ownership once the tenant's plan is accepted.
    pub fn commit(&mut self, namespace: &Namespace) {
        self.owners
            .entry(namespace.name.clone())
            .or_insert_with(|| (namespace.tier, namespace.tenant_id.clone()));
    }

    pub fn allocated(&self) -> impl Iterator<Item = &str> {
        self.owners.keys().map(String::as_str)
    }
}

fn describe_owner(tier: Tier, tenant_id: Option<&str>) -> String {
    match tenant_id {
        Some(id) => format!("tenant {id} ({tier})"),
        None => format!("{tier} pool"),
    }
}
