//! Tier policy — the decision table behind every placement.
//!
//! Each tier resolves to:
//! 1. A placement rule (pooled unless a tenant id is supplied, or always siloed)
//! 2. A sizing profile (requests/limits, replicas, job scaling bounds)
//! 3. Isolation requirements (claim routing, row-level access, tag key)
//! 4. Event bus placement (per namespace or shared across the tier)
//! 5. Per-service placement for siloed tenants, and the pool that hosts
//!    services they do not run themselves

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tenantgrid_core::config::{
    BusPlacement, PolicyConfig, ServiceSpec, TenantGridConfig, TierOverride,
};
use tenantgrid_core::{JobScaling, PlacementMode, ResourceQuantity, TenantResult, Tier};

/// How a tier maps tenants onto namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementRule {
    /// Anonymous tenants share the tier pool; identified tenants get their own namespace.
    PooledUnlessTenant,
    AlwaysSiloed,
}

impl PlacementRule {
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Basic | Tier::Premium => PlacementRule::PooledUnlessTenant,
            Tier::Advanced => PlacementRule::AlwaysSiloed,
        }
    }

    pub fn placement(&self, tenant_id: Option<&str>) -> PlacementMode {
        match (self, tenant_id) {
            (PlacementRule::PooledUnlessTenant, None) => PlacementMode::Pooled,
            _ => PlacementMode::Siloed,
        }
    }
}

/// Resources for every workload of a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingProfile {
    pub replicas: u32,
    pub requests: ResourceQuantity,
    pub limits: ResourceQuantity,
    /// Token-vendor sidecar, requests == limits.
    pub sidecar: ResourceQuantity,
    /// Bounds for queue-driven jobs.
    pub job: JobScaling,
}

/// What downstream composers must enforce for a tier.
///
/// Every tier can host more than one tenant at once, so routing predicates
/// and row-level grant conditions are unconditional. Only the scoping
/// mechanism itself varies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationRequirement {
    /// Session tag holding the caller's tenant id; `None` means no scoping mechanism.
    pub tag_key: Option<String>,
}

/// Full resolution of one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierResolution {
    pub tier: Tier,
    pub placement: PlacementRule,
    pub sizing: SizingProfile,
    pub isolation: IsolationRequirement,
    pub event_bus: BusPlacement,
    /// Pool serving this tier's pooled services.
    pub pool: Tier,
    /// Service name → placement for siloed tenants. Unlisted services are siloed.
    pub services: BTreeMap<String, PlacementMode>,
}

impl TierResolution {
    /// Where `service` runs for a tenant placed `mode`.
    ///
    /// Pooled tenants run everything in the pool. Siloed tenants follow the
    /// service's own per-tier entry, then the tier table.
    pub fn service_placement(&self, service: &ServiceSpec, mode: PlacementMode) -> PlacementMode {
        if mode == PlacementMode::Pooled {
            return PlacementMode::Pooled;
        }
        service
            .placement
            .get(&self.tier)
            .or_else(|| self.services.get(&service.name))
            .copied()
            .unwrap_or(PlacementMode::Siloed)
    }
}

/// Versioned tier decision table.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    version: semver::Version,
    tag_key: Option<String>,
    overrides: BTreeMap<Tier, TierOverride>,
}

impl TierPolicy {
    pub fn new(policy: &PolicyConfig, overrides: BTreeMap<Tier, TierOverride>) -> Self {
        let tag_key = Some(policy.tenant_tag_key.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Self {
            version: policy.version.clone(),
            tag_key,
            overrides,
        }
    }

    pub fn from_config(config: &TenantGridConfig) -> Self {
        Self::new(&config.policy, config.tiers.clone())
    }

    pub fn version(&self) -> &semver::Version {
        &self.version
    }

    /// Resolve a tier value taken from a roster entry.
    pub fn resolve_str(&self, tier: &str) -> TenantResult<TierResolution> {
        let tier: Tier = tier.parse()?;
        Ok(self.resolve(tier))
    }

    pub fn resolve(&self, tier: Tier) -> TierResolution {
        let mut sizing = builtin_sizing(tier);
        let mut event_bus = match tier {
            Tier::Basic | Tier::Premium => BusPlacement::PerNamespace,
            Tier::Advanced => BusPlacement::Shared,
        };
        let mut services = builtin_services(tier);

        if let Some(o) = self.overrides.get(&tier) {
            if let Some(replicas) = o.replicas {
                sizing.replicas = replicas;
            }
            if let Some(requests) = &o.requests {
                sizing.requests = requests.clone();
            }
            if let Some(limits) = &o.limits {
                sizing.limits = limits.clone();
            }
            if let Some(job) = &o.job {
                sizing.job = job.clone();
            }
            if let Some(bus) = o.event_bus {
                event_bus = bus;
            }
            services.extend(o.services.iter().map(|(name, mode)| (name.clone(), *mode)));
        }

        let isolation = IsolationRequirement {
            tag_key: self.tag_key.clone(),
        };

        debug!(
            tier = %tier,
            policy_version = %self.version,
            replicas = sizing.replicas,
            "resolved tier policy"
        );

        TierResolution {
            tier,
            placement: PlacementRule::for_tier(tier),
            sizing,
            isolation,
            event_bus,
            pool: pool_tier(tier),
            services,
        }
    }
}

/// Advanced tenants share the basic pool's catalog services.
fn pool_tier(tier: Tier) -> Tier {
    match tier {
        Tier::Basic | Tier::Advanced => Tier::Basic,
        Tier::Premium => Tier::Premium,
    }
}

fn builtin_services(tier: Tier) -> BTreeMap<String, PlacementMode> {
    match tier {
        Tier::Advanced => ["product", "order"]
            .into_iter()
            .map(|name| (name.to_string(), PlacementMode::Pooled))
            .collect(),
        Tier::Basic | Tier::Premium => BTreeMap::new(),
    }
}

fn builtin_sizing(tier: Tier) -> SizingProfile {
    let sidecar = ResourceQuantity::new("100m", "100Mi");
    match tier {
        Tier::Basic => SizingProfile {
            replicas: 1,
            requests: ResourceQuantity::new("100m", "250Mi"),
            limits: ResourceQuantity::new("150m", "300Mi"),
            sidecar,
            job: JobScaling {
                min_replicas: 0,
                max_replicas: 5,
                queue_length: 30,
                polling_interval_secs: 30,
            },
        },
        Tier::Advanced => SizingProfile {
            replicas: 2,
            requests: ResourceQuantity::new("250m", "512Mi"),
            limits: ResourceQuantity::new("500m", "768Mi"),
            sidecar,
            job: JobScaling {
                min_replicas: 0,
                max_replicas: 10,
                queue_length: 20,
                polling_interval_secs: 15,
            },
        },
        Tier::Premium => SizingProfile {
            replicas: 3,
            requests: ResourceQuantity::new("500m", "1Gi"),
            limits: ResourceQuantity::new("1", "2Gi"),
            sidecar,
            job: JobScaling {
                min_replicas: 1,
                max_replicas: 20,
                queue_length: 10,
                polling_interval_secs: 10,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgrid_core::TenantError;

    fn default_policy() -> TierPolicy {
        TierPolicy::new(&PolicyConfig::default(), BTreeMap::new())
    }

    #[test]
    fn basic_and_premium_pool_unless_tenant() {
        let policy = default_policy();
        for tier in [Tier::Basic, Tier::Premium] {
            let res = policy.resolve(tier);
            assert_eq!(res.placement, PlacementRule::PooledUnlessTenant);
            assert_eq!(res.placement.placement(None), PlacementMode::Pooled);
            assert_eq!(res.placement.placement(Some("t1")), PlacementMode::Siloed);
        }
    }

    #[test]
    fn advanced_is_always_siloed() {
        let res = default_policy().resolve(Tier::Advanced);
        assert_eq!(res.placement, PlacementRule::AlwaysSiloed);
        assert_eq!(res.placement.placement(None), PlacementMode::Siloed);
        assert_eq!(res.event_bus, BusPlacement::Shared);
    }

    #[test]
    fn every_tier_scopes_by_the_policy_tag() {
        let policy = default_policy();
        for tier in Tier::ALL {
            let isolation = policy.resolve(tier).isolation;
            assert_eq!(isolation.tag_key.as_deref(), Some("TenantID"));
        }
    }

    #[test]
    fn unknown_tier_string_fails_resolution() {
        let err = default_policy().resolve_str("gold").unwrap_err();
        assert!(matches!(err, TenantError::UnsupportedTier { .. }));
    }

    #[test]
    fn overrides_replace_builtin_sizing() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Tier::Basic,
            TierOverride {
                replicas: Some(4),
                event_bus: Some(BusPlacement::Shared),
                requests: Some(ResourceQuantity::new("200m", "300Mi")),
                limits: None,
                job: None,
                services: BTreeMap::from([("invoice".to_string(), PlacementMode::Pooled)]),
            },
        );
        let policy = TierPolicy::new(&PolicyConfig::default(), overrides);
        let res = policy.resolve(Tier::Basic);
        assert_eq!(res.sizing.replicas, 4);
        assert_eq!(res.sizing.requests.cpu, "200m");
        assert_eq!(res.sizing.limits, ResourceQuantity::new("150m", "300Mi"));
        assert_eq!(res.event_bus, BusPlacement::Shared);
        assert_eq!(res.services["invoice"], PlacementMode::Pooled);
        // Untouched tiers keep the table.
        assert_eq!(policy.resolve(Tier::Premium).sizing.replicas, 3);
    }

    #[test]
    fn empty_tag_key_means_no_scoping_mechanism() {
        let config = PolicyConfig {
            tenant_tag_key: "  ".to_string(),
            ..PolicyConfig::default()
        };
        let policy = TierPolicy::new(&config, BTreeMap::new());
        assert_eq!(policy.resolve(Tier::Basic).isolation.tag_key, None);
    }

    #[test]
    fn advanced_tenants_use_the_basic_pool_for_product_and_order() {
        let catalog = tenantgrid_core::ServiceCatalog::builtin();
        let res = default_policy().resolve(Tier::Advanced);
        assert_eq!(res.pool, Tier::Basic);

        let placed = |name: &str, mode| res.service_placement(catalog.service(name).unwrap(), mode);
        assert_eq!(placed("product", PlacementMode::Siloed), PlacementMode::Pooled);
        assert_eq!(placed("order", PlacementMode::Siloed), PlacementMode::Pooled);
        assert_eq!(placed("fulfillment", PlacementMode::Siloed), PlacementMode::Siloed);
        assert_eq!(placed("invoice", PlacementMode::Siloed), PlacementMode::Siloed);

        let premium = default_policy().resolve(Tier::Premium);
        assert_eq!(premium.pool, Tier::Premium);
        assert!(premium.services.is_empty());
    }

    #[test]
    fn service_entry_overrides_tier_table() {
        let catalog = tenantgrid_core::ServiceCatalog::builtin();
        let mut product = catalog.service("product").unwrap().clone();
        product.placement.insert(Tier::Advanced, PlacementMode::Siloed);
        let res = default_policy().resolve(Tier::Advanced);

        assert_eq!(
            res.service_placement(&product, PlacementMode::Siloed),
            PlacementMode::Siloed
        );
        // Pooled tenants never leave the pool.
        assert_eq!(
            res.service_placement(&product, PlacementMode::Pooled),
            PlacementMode::Pooled
        );
    }

    #[test]
    fn job_bounds_present_for_queue_workloads() {
        let job = default_policy().resolve(Tier::Basic).sizing.job;
        assert_eq!(job.min_replicas, 0);
        assert_eq!(job.max_replicas, 5);
        assert_eq!(job.queue_length, 30);
    }
}
