//! Store placement — maps a catalog store onto a namespace.

use serde::{Deserialize, Serialize};

use tenantgrid_core::config::{BusPlacement, Provisioning, StoreKind, StoreSpec};
use tenantgrid_core::Namespace;

/// A concrete store as seen from one namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreRef {
    /// Catalog name.
    pub store: String,
    pub kind: StoreKind,
    pub provisioning: Provisioning,
    /// Owning namespace; `None` for cluster-wide stores.
    pub namespace: Option<String>,
    /// Name of the physical resource.
    pub physical_name: String,
    pub tenant_key: Option<String>,
}

impl StoreRef {
    /// Whether more than one tenant reads or writes this store through `namespace`.
    pub fn is_shared_in(&self, namespace: &Namespace) -> bool {
        match self.provisioning {
            Provisioning::Shared => true,
            Provisioning::PerNamespace => namespace.is_pooled(),
        }
    }
}

/// Resolve a store for a namespace.
///
/// Tables and queues default to one instance per namespace. Event buses
/// follow the tier's bus placement unless the store pins its provisioning.
pub fn resolve_store(
    spec: &StoreSpec,
    namespace: &Namespace,
    bus_placement: BusPlacement,
    shared_bus: &str,
) -> StoreRef {
    let provisioning = spec.provisioning_for(bus_placement);

    let (owner, physical_name) = match provisioning {
        Provisioning::PerNamespace => (
            Some(namespace.name.clone()),
            format!("{}-{}", namespace.name, spec.name),
        ),
        Provisioning::Shared if spec.kind == StoreKind::EventBus => (None, shared_bus.to_string()),
        Provisioning::Shared => (None, spec.name.clone()),
    };

    StoreRef {
        store: spec.name.clone(),
        kind: spec.kind,
        provisioning,
        namespace: owner,
        physical_name,
        tenant_key: spec.tenant_key.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgrid_core::{PlacementMode, ServiceCatalog, Tier};

    fn pool() -> Namespace {
        Namespace::new("basic-pool".into(), Tier::Basic, None, PlacementMode::Pooled)
    }

    fn silo() -> Namespace {
        Namespace::new(
            "tenant-b".into(),
            Tier::Advanced,
            Some("tenant-b".into()),
            PlacementMode::Siloed,
        )
    }

    #[test]
    fn per_namespace_table_is_shared_only_in_pools() {
        let catalog = ServiceCatalog::builtin();
        let orders = catalog.store("orders").unwrap();

        let pooled = resolve_store(orders, &pool(), BusPlacement::PerNamespace, "bus");
        assert_eq!(pooled.physical_name, "basic-pool-orders");
        assert!(pooled.is_shared_in(&pool()));

        let siloed = resolve_store(orders, &silo(), BusPlacement::Shared, "bus");
        assert_eq!(siloed.namespace.as_deref(), Some("tenant-b"));
        assert!(!siloed.is_shared_in(&silo()));
    }

    #[test]
    fn bus_follows_tier_placement() {
        let catalog = ServiceCatalog::builtin();
        let bus = catalog.event_bus().unwrap();

        let own = resolve_store(bus, &pool(), BusPlacement::PerNamespace, "advanced-tier-event-bus");
        assert_eq!(own.physical_name, "basic-pool-event-bus");

        let shared = resolve_store(bus, &silo(), BusPlacement::Shared, "advanced-tier-event-bus");
        assert_eq!(shared.physical_name, "advanced-tier-event-bus");
        assert_eq!(shared.namespace, None);
        assert!(shared.is_shared_in(&silo()));
    }
}
