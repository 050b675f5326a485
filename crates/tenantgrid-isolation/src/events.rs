//! Event subscriptions — which events reach a consumer's queue.
//!
//! A pooled consumer sees every event of its tier; its queue is shared and
//! the consumer row-scopes downstream. A siloed consumer sees only events
//! carrying its exact tenant id and tier, so two siloed tenants never
//! receive each other's events even on a shared bus. Tiers with a pool keep
//! their consumers off shared buses; the composer refuses that placement.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tenantgrid_core::config::{EventSource, ServiceSpec};
use tenantgrid_core::naming::check_length;
use tenantgrid_core::{ComposeError, DeriveResult, Namespace, ServiceCatalog, Tier};
use tenantgrid_placement::TierResolution;

use crate::stores::{StoreRef, resolve_store};

/// Longest name the event bus accepts for a rule.
pub const MAX_RULE_NAME_LEN: usize = 64;

/// An event as published to a bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEvent {
    pub source: String,
    pub detail_type: String,
    pub tier: Tier,
    pub tenant_id: String,
}

impl BusEvent {
    pub fn new(source: &str, detail_type: &str, tier: Tier, tenant_id: &str) -> Self {
        Self {
            source: source.to_string(),
            detail_type: detail_type.to_string(),
            tier,
            tenant_id: tenant_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventFilter {
    /// Every event in the account.
    Any,
    Pattern {
        source: String,
        detail_type: String,
        tier: Tier,
        tenant_id: Option<String>,
    },
}

impl EventFilter {
    pub fn matches(&self, event: &BusEvent) -> bool {
        match self {
            EventFilter::Any => true,
            EventFilter::Pattern {
                source,
                detail_type,
                tier,
                tenant_id,
            } => {
                *source == event.source
                    && *detail_type == event.detail_type
                    && *tier == event.tier
                    && tenant_id.as_ref().is_none_or(|id| *id == event.tenant_id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    TenantScoped,
    TierScoped,
    /// Audit copy of all bus traffic; never feeds a workload.
    Observability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionTarget {
    Queue(StoreRef),
    LogGroup { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub name: String,
    /// Namespace owning the subscription; `None` for cluster-wide watchers.
    pub namespace: Option<String>,
    pub bus: StoreRef,
    pub kind: SubscriptionKind,
    pub filter: EventFilter,
    pub target: SubscriptionTarget,
}

pub struct EventFilterComposer<'a> {
    catalog: &'a ServiceCatalog,
    shared_bus: String,
}

impl<'a> EventFilterComposer<'a> {
    pub fn new(catalog: &'a ServiceCatalog, shared_bus: &str) -> Self {
        Self {
            catalog,
            shared_bus: shared_bus.to_string(),
        }
    }

    /// Bus the namespace publishes to and subscribes on.
    pub fn bus_for(&self, namespace: &Namespace, resolution: &TierResolution) -> Option<StoreRef> {
        self.catalog
            .event_bus()
            .map(|spec| resolve_store(spec, namespace, resolution.event_bus, &self.shared_bus))
    }

    /// Subscription delivering `event` to `consumer`'s queue in `namespace`.
    pub fn compose(
        &self,
        consumer: &ServiceSpec,
        event: &EventSource,
        namespace: &Namespace,
        resolution: &TierResolution,
    ) -> DeriveResult<EventSubscription> {
        let unknown = |dependency: &str| ComposeError::UnknownDependency {
            service: consumer.name.clone(),
            dependency: dependency.to_string(),
        };

        let bus = self
            .bus_for(namespace, resolution)
            .ok_or_else(|| unknown("event bus"))?;
        let queue_spec = consumer
            .queue
            .as_deref()
            .and_then(|q| self.catalog.store(q))
            .ok_or_else(|| unknown("queue for consumed events"))?;
        let queue = resolve_store(queue_spec, namespace, resolution.event_bus, &self.shared_bus);

        let name = format!("{}-{}-{}", consumer.name, namespace.name, event.detail_type);
        check_length("event rule", &name, MAX_RULE_NAME_LEN)?;

        let (kind, tenant_id) = match &namespace.tenant_id {
            Some(id) if !namespace.is_pooled() => (SubscriptionKind::TenantScoped, Some(id.clone())),
            _ => (SubscriptionKind::TierScoped, None),
        };

        debug!(
            subscription = %name,
            bus = %bus.physical_name,
            ?kind,
            "composed event subscription"
        );

        Ok(EventSubscription {
            name,
            namespace: Some(namespace.name.clone()),
            bus,
            kind,
            filter: EventFilter::Pattern {
                source: event.source.clone(),
                detail_type: event.detail_type.clone(),
                tier: namespace.tier,
                tenant_id,
            },
            target: SubscriptionTarget::Queue(queue),
        })
    }

    /// Account-wide watcher copying every event on `bus` into an audit log group.
    pub fn observability(&self, bus: &StoreRef, log_prefix: &str) -> EventSubscription {
        EventSubscription {
            name: format!("{}-watcher", bus.physical_name),
            namespace: bus.namespace.clone(),
            bus: bus.clone(),
            kind: SubscriptionKind::Observability,
            filter: EventFilter::Any,
            target: SubscriptionTarget::LogGroup {
                name: format!(
                    "{}/{}-logs",
                    log_prefix.trim_end_matches('/'),
                    bus.physical_name
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tenantgrid_core::config::PolicyConfig;
    use tenantgrid_core::{DeriveError, PlacementMode, TenantError};
    use tenantgrid_placement::TierPolicy;

    const SHARED_BUS: &str = "advanced-tier-event-bus";

    fn resolution(tier: Tier) -> TierResolution {
        TierPolicy::new(&PolicyConfig::default(), BTreeMap::new()).resolve(tier)
    }

    fn pool(tier: Tier) -> Namespace {
        Namespace::new(format!("{tier}-pool"), tier, None, PlacementMode::Pooled)
    }

    fn silo(id: &str, tier: Tier) -> Namespace {
        Namespace::new(id.to_string(), tier, Some(id.to_string()), PlacementMode::Siloed)
    }

    fn fulfilled(tier: Tier, tenant: &str) -> BusEvent {
        BusEvent::new("fulfillment-service", "order-fulfilled", tier, tenant)
    }

    fn make_subscription(ns: &Namespace) -> EventSubscription {
        let catalog = ServiceCatalog::builtin();
        let composer = EventFilterComposer::new(&catalog, SHARED_BUS);
        let invoice = catalog.service("invoice").unwrap();
        composer
            .compose(invoice, &invoice.consumes[0], ns, &resolution(ns.tier))
            .unwrap()
    }

    #[test]
    fn pooled_subscription_filters_on_tier_only() {
        let sub = make_subscription(&pool(Tier::Basic));
        assert_eq!(sub.name, "invoice-basic-pool-order-fulfilled");
        assert_eq!(sub.kind, SubscriptionKind::TierScoped);
        assert_eq!(sub.bus.physical_name, "basic-pool-event-bus");
        assert!(sub.filter.matches(&fulfilled(Tier::Basic, "anyone")));
        assert!(!sub.filter.matches(&fulfilled(Tier::Premium, "anyone")));
        match &sub.target {
            SubscriptionTarget::Queue(queue) => {
                assert_eq!(queue.physical_name, "basic-pool-invoice-queue")
            }
            other => panic!("unexpected target {other:?}"),
        }
    }

    #[test]
    fn siloed_filters_are_mutually_exclusive_on_shared_bus() {
        let b = make_subscription(&silo("tenant-b", Tier::Advanced));
        let d = make_subscription(&silo("tenant-d", Tier::Advanced));

        assert_eq!(b.bus.physical_name, SHARED_BUS);
        assert_eq!(b.bus, d.bus);
        assert_eq!(b.kind, SubscriptionKind::TenantScoped);

        let for_b = fulfilled(Tier::Advanced, "tenant-b");
        let for_d = fulfilled(Tier::Advanced, "tenant-d");
        assert!(b.filter.matches(&for_b) && !b.filter.matches(&for_d));
        assert!(d.filter.matches(&for_d) && !d.filter.matches(&for_b));
    }

    #[test]
    fn filter_ignores_other_event_types() {
        let sub = make_subscription(&silo("tenant-c", Tier::Premium));
        let other = BusEvent::new("fulfillment-service", "order-cancelled", Tier::Premium, "tenant-c");
        assert!(!sub.filter.matches(&other));
        assert_eq!(sub.bus.physical_name, "tenant-c-event-bus");
    }

    #[test]
    fn over_long_rule_name_rejects_tenant() {
        let catalog = ServiceCatalog::builtin();
        let composer = EventFilterComposer::new(&catalog, SHARED_BUS);
        let invoice = catalog.service("invoice").unwrap();
        let ns = silo(&"t".repeat(50), Tier::Advanced);
        let err = composer
            .compose(invoice, &invoice.consumes[0], &ns, &resolution(Tier::Advanced))
            .unwrap_err();
        assert!(matches!(
            err,
            DeriveError::Tenant(TenantError::NameTooLong { limit: MAX_RULE_NAME_LEN, .. })
        ));
    }

    #[test]
    fn observability_watcher_sees_everything() {
        let catalog = ServiceCatalog::builtin();
        let composer = EventFilterComposer::new(&catalog, SHARED_BUS);
        let bus = composer
            .bus_for(&silo("tenant-b", Tier::Advanced), &resolution(Tier::Advanced))
            .unwrap();
        let watcher = composer.observability(&bus, "/saas-workshop/");

        assert_eq!(watcher.name, "advanced-tier-event-bus-watcher");
        assert_eq!(watcher.kind, SubscriptionKind::Observability);
        assert_eq!(watcher.namespace, None);
        assert!(watcher.filter.matches(&fulfilled(Tier::Basic, "x")));
        assert_eq!(
            watcher.target,
            SubscriptionTarget::LogGroup {
                name: "/saas-workshop/advanced-tier-event-bus-logs".to_string()
            }
        );
    }
}
