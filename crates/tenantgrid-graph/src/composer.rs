//! Application composer: roster in, deployment graph out.
//!
//! For every roster entry the composer:
//! 1. Resolves the tier against the policy table
//! 2. Allocates the tenant's namespace, and the pool when the tier serves
//!    some of a siloed tenant's services from it
//! 3. Binds identities and grants, routes, and event subscriptions per service
//! 4. Builds a tenant plan and merges it into the shared graph
//!
//! Per-entry failures reject that entry and discard its whole plan. Failures
//! that mean the configuration itself is unsafe abort the run with no graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use tenantgrid_core::config::{PolicyConfig, Provisioning, ServiceSpec, StoreKind, WorkloadKind};
use tenantgrid_core::naming::{service_host, validate_label};
use tenantgrid_core::{
    ComposeError, ComposeResult, DeriveError, DeriveResult, Namespace, PlacementMode,
    RosterEntry, ServiceCatalog, TenantError, TenantGridConfig, TenantRef, Tier,
    workload_labels,
};
use tenantgrid_isolation::{
    Binding, EventFilterComposer, IdentityBinder, StoreRef, SubscriptionTarget,
};
use tenantgrid_mesh::{RouteTable, RoutingComposer, RoutingRule};
use tenantgrid_placement::{NamespaceAllocator, PlacementRule, TierPolicy, TierResolution};

use crate::builder::{DependencyGraphBuilder, TenantPlan, check_service_cycles};
use crate::graph::DeploymentGraph;
use crate::node::{NamespacePolicy, NodeKey, NodeSpec, SIDECAR_PORT, Workload};

/// A roster entry that could not be composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub tenant: TenantRef,
    pub error: TenantError,
}

/// Successful composition. Rejected entries contributed nothing to the graph.
#[derive(Debug, Clone)]
pub struct Composition {
    pub graph: DeploymentGraph,
    pub rejected: Vec<Rejection>,
    /// Ingress rules in first-match evaluation order.
    pub routes: RouteTable,
}

/// Composition stopped on a run-wide error; no graph is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("composition aborted: {cause}")]
pub struct CompositionAborted {
    pub cause: ComposeError,
    /// Entries rejected before the abort.
    pub rejected: Vec<Rejection>,
}

impl From<ComposeError> for CompositionAborted {
    fn from(cause: ComposeError) -> Self {
        Self {
            cause,
            rejected: Vec::new(),
        }
    }
}

/// Compose the full roster of `config`.
pub fn compose(config: &TenantGridConfig) -> Result<Composition, CompositionAborted> {
    let composer = ApplicationComposer::from_config(config)?;
    composer.compose(&config.tenants)
}

/// Compose only the roster entries picked by `selectors`.
///
/// A selector matches an entry's tenant id, or for anonymous entries the
/// pool they occupy (`basic-pool`). Nodes shared with the rest of the roster
/// come out identical to a full composition.
pub fn compose_subset(
    config: &TenantGridConfig,
    selectors: &[&str],
) -> Result<Composition, CompositionAborted> {
    let composer = ApplicationComposer::from_config(config)?;
    let picked = config
        .tenants
        .iter()
        .enumerate()
        .filter(|(_, entry)| selectors.iter().any(|s| selects(s, entry)));
    composer.compose_entries(picked)
}

fn selects(selector: &str, entry: &RosterEntry) -> bool {
    match &entry.tenant_id {
        Some(id) => id == selector,
        None => format!("{}-pool", entry.tier.trim().to_ascii_lowercase()) == selector,
    }
}

pub struct ApplicationComposer {
    policy: TierPolicy,
    settings: PolicyConfig,
    catalog: ServiceCatalog,
}

/// Everything one roster entry contributes.
struct EntryPlan {
    home: Namespace,
    /// Pool serving some of a siloed tenant's services.
    pool: Option<Namespace>,
    plan: TenantPlan,
    routes: Vec<RoutingRule>,
}

/// Where each service runs for one roster entry.
#[derive(Default)]
struct ServiceLayout {
    /// Service name → hosting namespace.
    hosts: BTreeMap<String, String>,
    workloads: BTreeMap<String, NodeKey>,
}

impl ApplicationComposer {
    /// Validate the catalog and policy. Fails on unknown references, service
    /// dependency cycles, or placements that would mix tenants' events.
    pub fn from_config(config: &TenantGridConfig) -> ComposeResult<Self> {
        let catalog = ServiceCatalog::from_config(config)?;
        check_service_cycles(&catalog)?;
        let policy = TierPolicy::from_config(config);
        check_placements(&catalog, &policy)?;
        Ok(Self {
            policy,
            settings: config.policy.clone(),
            catalog,
        })
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn compose(&self, roster: &[RosterEntry]) -> Result<Composition, CompositionAborted> {
        self.compose_entries(roster.iter().enumerate())
    }

    fn compose_entries<'e>(
        &self,
        entries: impl Iterator<Item = (usize, &'e RosterEntry)>,
    ) -> Result<Composition, CompositionAborted> {
        let mut allocator = NamespaceAllocator::new();
        let mut builder = DependencyGraphBuilder::new();
        let mut routes = RouteTable::new();
        let mut rejected = Vec::new();
        let mut accepted = 0usize;

        for (index, entry) in entries {
            let tenant = TenantRef::for_entry(index, entry);

            match self.plan_entry(entry, &allocator) {
                Ok(entry_plan) => {
                    for rule in entry_plan.routes {
                        if let Err(cause) = routes.insert(rule) {
                            return Err(abort(&tenant, cause, rejected));
                        }
                    }
                    if let Err(cause) = builder.merge(entry_plan.plan) {
                        return Err(abort(&tenant, cause, rejected));
                    }
                    allocator.commit(&entry_plan.home);
                    if let Some(pool) = &entry_plan.pool {
                        allocator.commit(pool);
                    }
                    accepted += 1;
                    debug!(
                        tenant = %tenant,
                        namespace = %entry_plan.home.name,
                        pool = ?entry_plan.pool.as_ref().map(|p| &p.name),
                        "tenant composed"
                    );
                }
                Err(DeriveError::Tenant(error)) => {
                    warn!(tenant = %tenant, %error, "rejected roster entry");
                    rejected.push(Rejection { tenant, error });
                }
                Err(DeriveError::Abort(cause)) => return Err(abort(&tenant, cause, rejected)),
            }
        }

        let graph = builder.build().map_err(|cause| CompositionAborted {
            cause,
            rejected: rejected.clone(),
        })?;

        info!(
            policy_version = %self.policy.version(),
            accepted,
            rejected = rejected.len(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            "composition complete"
        );

        Ok(Composition {
            graph,
            rejected,
            routes,
        })
    }

    /// Derive everything one roster entry needs, without touching shared state.
    ///
    /// A siloed tenant whose tier pools some services gets the whole pool
    /// planned alongside its own namespace, plus tenant-specific routes onto
    /// the pooled services.
    fn plan_entry(
        &self,
        entry: &RosterEntry,
        allocator: &NamespaceAllocator,
    ) -> DeriveResult<EntryPlan> {
        let resolution = self.policy.resolve_str(&entry.tier)?;
        let home = allocator.allocate(resolution.tier, entry.tenant_id.as_deref())?;

        let (own, pooled): (Vec<&ServiceSpec>, Vec<&ServiceSpec>) = self
            .catalog
            .services()
            .partition(|s| {
                resolution.service_placement(s, home.isolation_level) == home.isolation_level
            });

        let mut plan = TenantPlan::new();
        let mut routes = Vec::new();
        let mut layout = ServiceLayout::default();

        let pool = if pooled.is_empty() {
            None
        } else {
            let pool_resolution = self.policy.resolve(resolution.pool);
            let pool = allocator.allocate(pool_resolution.tier, None)?;
            let everything: Vec<&ServiceSpec> = self.catalog.services().collect();
            let mut pool_layout = ServiceLayout::default();
            self.plan_namespace(
                &mut plan,
                &mut routes,
                &pool,
                &pool_resolution,
                &everything,
                &mut pool_layout,
            )?;

            let router = self.router();
            for service in &pooled {
                let Some(workload_key) = pool_layout.workloads.get(&service.name) else {
                    continue;
                };
                layout.hosts.insert(service.name.clone(), pool.name.clone());
                layout.workloads.insert(service.name.clone(), workload_key.clone());

                if let Some(rule) = router.compose_in(service, &home, &pool)? {
                    let route_key = plan.add(NodeSpec::RoutingRule(rule.clone()))?;
                    plan.edge(workload_key, &route_key);
                    routes.push(rule);
                }
            }
            debug!(
                namespace = %home.name,
                pool = %pool.name,
                services = pooled.len(),
                "served pooled services"
            );
            Some(pool)
        };

        self.plan_namespace(&mut plan, &mut routes, &home, &resolution, &own, &mut layout)?;

        Ok(EntryPlan {
            home,
            pool,
            plan,
            routes,
        })
    }

    /// Plan `services` inside `namespace`. `layout` already holds services
    /// the namespace reaches in another namespace.
    fn plan_namespace(
        &self,
        plan: &mut TenantPlan,
        routes: &mut Vec<RoutingRule>,
        namespace: &Namespace,
        resolution: &TierResolution,
        services: &[&ServiceSpec],
        layout: &mut ServiceLayout,
    ) -> DeriveResult<()> {
        let binder = IdentityBinder::new(&self.catalog, &self.settings.shared_event_bus);
        let events = EventFilterComposer::new(&self.catalog, &self.settings.shared_event_bus);
        let router = self.router();
        let planned_before = plan.len();

        for service in services {
            layout.hosts.insert(service.name.clone(), namespace.name.clone());
        }

        let ns_key = plan.add(NodeSpec::Namespace(namespace.clone()))?;
        let localhost = plan.add(NodeSpec::NamespacePolicy(NamespacePolicy::sidecar_localhost(
            &namespace.name,
        )))?;
        let authz = plan.add(NodeSpec::NamespacePolicy(NamespacePolicy::auth_filter(
            &namespace.name,
        )))?;
        plan.edge(&ns_key, &localhost);
        plan.edge(&localhost, &authz);

        let bus = events.bus_for(namespace, resolution);
        let uses_bus = services.iter().any(|s| s.uses_events());
        let bus_key = match &bus {
            Some(bus) if uses_bus => {
                let key = add_store(plan, &ns_key, bus)?;
                let watcher = events.observability(bus, &self.settings.log_prefix);
                let watcher_key = plan.add(NodeSpec::EventSubscription(watcher))?;
                plan.edge(&key, &watcher_key);
                Some(key)
            }
            _ => None,
        };

        for service in services {
            let binding = binder.bind(service, namespace, resolution)?;

            let sa_key = plan.add(NodeSpec::ServiceAccount(binding.identity.clone()))?;
            plan.edge(&ns_key, &sa_key);

            let workload = self.workload(
                service,
                namespace,
                resolution,
                &binding,
                bus.as_ref(),
                &layout.hosts,
            )?;
            let workload_key = plan.add(NodeSpec::Workload(workload))?;
            plan.edge(&authz, &workload_key);

            for grant in &binding.grants {
                let store_key = add_store(plan, &ns_key, &grant.resource)?;
                let grant_key = plan.add(NodeSpec::AccessGrant(grant.clone()))?;
                plan.edge(&sa_key, &grant_key);
                plan.edge(&store_key, &grant_key);
                plan.edge(&grant_key, &workload_key);
            }

            if service.publishes.is_some() {
                if let Some(bus_key) = &bus_key {
                    plan.edge(bus_key, &workload_key);
                }
            }

            if let Some(rule) = router.compose(service, namespace)? {
                let route_key = plan.add(NodeSpec::RoutingRule(rule.clone()))?;
                plan.edge(&workload_key, &route_key);
                routes.push(rule);
            }

            layout.workloads.insert(service.name.clone(), workload_key);
        }

        for service in services {
            let Some(dependent) = layout.workloads.get(&service.name) else {
                continue;
            };
            for dep in &service.depends_on {
                if let Some(dependency) = layout.workloads.get(dep) {
                    plan.edge(dependency, dependent);
                }
            }

            for event in &service.consumes {
                let subscription = events.compose(service, event, namespace, resolution)?;
                if let SubscriptionTarget::Queue(queue) = &subscription.target {
                    let queue_key = add_store(plan, &ns_key, queue)?;
                    let sub_key = plan.add(NodeSpec::EventSubscription(subscription.clone()))?;
                    plan.edge(&queue_key, &sub_key);
                    plan.edge(dependent, &sub_key);
                    if let Some(bus_key) = &bus_key {
                        plan.edge(bus_key, &sub_key);
                    }
                    let publisher = self
                        .catalog
                        .publisher_of(event)
                        .and_then(|p| layout.workloads.get(&p.name));
                    if let Some(publisher) = publisher {
                        plan.edge(publisher, &sub_key);
                    }
                }
            }
        }

        debug!(
            namespace = %namespace.name,
            tier = %resolution.tier,
            nodes = plan.len() - planned_before,
            services = services.len(),
            "planned namespace"
        );

        Ok(())
    }

    fn router(&self) -> RoutingComposer {
        RoutingComposer::new(&self.settings.ingress_host, &self.settings.ingress_gateway)
    }

    fn workload(
        &self,
        service: &ServiceSpec,
        namespace: &Namespace,
        resolution: &TierResolution,
        binding: &Binding,
        bus: Option<&StoreRef>,
        hosts: &BTreeMap<String, String>,
    ) -> Result<Workload, TenantError> {
        validate_label("workload", &service.name)?;
        let sizing = &resolution.sizing;

        let mut labels = workload_labels(namespace.tier, namespace.tenant_id.as_deref());
        labels.insert("app".to_string(), service.name.clone());
        if service.path_prefix.is_some() {
            labels.insert("authorization".to_string(), "enabled".to_string());
        }

        let mut env = BTreeMap::new();
        env.insert("SERVICE_NAME".to_string(), service.name.clone());
        env.insert("TOKEN_VENDOR_ENDPOINT_PORT".to_string(), SIDECAR_PORT.to_string());
        if let Some(tag) = &resolution.isolation.tag_key {
            env.insert("TENANT_TAG_KEY".to_string(), tag.clone());
        }
        let mut seen_kinds = BTreeSet::new();
        for grant in &binding.grants {
            let resource = &grant.resource;
            let suffix = match resource.kind {
                StoreKind::Table => "TABLE_NAME",
                StoreKind::Queue => "QUEUE_NAME",
                StoreKind::EventBus => "EVENT_BUS_NAME",
            };
            let key = if seen_kinds.insert(resource.kind) {
                suffix.to_string()
            } else {
                format!("{}_{suffix}", env_name(&resource.store))
            };
            env.insert(key, resource.physical_name.clone());
        }
        for dep in &service.depends_on {
            let host_ns = hosts.get(dep).unwrap_or(&namespace.name);
            env.insert(format!("{}_ENDPOINT", env_name(dep)), service_host(dep, host_ns));
        }
        if let Some(event) = &service.publishes {
            if let Some(bus) = bus {
                env.insert("EVENT_BUS_NAME".to_string(), bus.physical_name.clone());
            }
            env.insert("EVENT_SOURCE".to_string(), event.source.clone());
            env.insert("EVENT_DETAIL_TYPE".to_string(), event.detail_type.clone());
        }

        let (replicas, job) = match service.kind {
            WorkloadKind::Deployment => (sizing.replicas, None),
            WorkloadKind::QueueJob => (0, Some(sizing.job.clone())),
        };

        Ok(Workload {
            name: service.name.clone(),
            namespace: namespace.name.clone(),
            service: service.name.clone(),
            kind: service.kind,
            image: service.image.clone(),
            service_account: binding.identity.name.clone(),
            port: service.port,
            replicas,
            requests: sizing.requests.clone(),
            limits: sizing.limits.clone(),
            sidecar: sizing.sidecar.clone(),
            job,
            labels,
            env,
        })
    }
}

/// Reject placements under which one tenant's events could reach another
/// tenant's queue.
///
/// A pool subscribes to every event of its tier, so a tier with a pool may
/// not put its consumers on a shared bus that its siloed tenants publish to.
/// Services that publish or consume events always run in the tenant's own
/// namespace.
fn check_placements(catalog: &ServiceCatalog, policy: &TierPolicy) -> ComposeResult<()> {
    for tier in Tier::ALL {
        let resolution = policy.resolve(tier);
        let invalid = |service: &ServiceSpec, reason: &str| {
            warn!(tier = %tier, service = %service.name, reason, "invalid placement");
            ComposeError::InvalidPlacement {
                tier,
                service: service.name.clone(),
                reason: reason.to_string(),
            }
        };

        let shares_bus = catalog
            .event_bus()
            .is_some_and(|bus| bus.provisioning_for(resolution.event_bus) == Provisioning::Shared);
        if shares_bus && resolution.placement == PlacementRule::PooledUnlessTenant {
            if let Some(consumer) = catalog.services().find(|s| !s.consumes.is_empty()) {
                return Err(invalid(
                    consumer,
                    "the pool's subscription on a shared bus would receive siloed tenants' events",
                ));
            }
        }

        for service in catalog.services() {
            let pooled = resolution.service_placement(service, PlacementMode::Siloed)
                == PlacementMode::Pooled;
            if pooled && service.uses_events() {
                return Err(invalid(
                    service,
                    "event publishers and consumers must run in the tenant's own namespace",
                ));
            }
        }
    }
    Ok(())
}

fn abort(tenant: &TenantRef, cause: ComposeError, rejected: Vec<Rejection>) -> CompositionAborted {
    warn!(tenant = %tenant, error = %cause, kind = cause.kind(), "composition aborted");
    CompositionAborted { cause, rejected }
}

/// Add a store node, ordered after its namespace when it has one.
fn add_store(plan: &mut TenantPlan, ns_key: &NodeKey, store: &StoreRef) -> ComposeResult<NodeKey> {
    let key = plan.add(NodeSpec::DataStore(store.clone()))?;
    if store.namespace.is_some() {
        plan.edge(ns_key, &key);
    }
    Ok(key)
}

fn env_name(name: &str) -> String {
    name.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ResourceKind;

    fn make_config(roster: &[(Option<&str>, &str)]) -> TenantGridConfig {
        TenantGridConfig {
            tenants: roster
                .iter()
                .map(|(id, tier)| RosterEntry::new(*id, tier))
                .collect(),
            ..TenantGridConfig::default()
        }
    }

    fn workload<'a>(graph: &'a DeploymentGraph, ns: &str, name: &str) -> &'a Workload {
        let key = NodeKey::new(ResourceKind::Workload, Some(ns), name);
        match graph.node(&key) {
            Some(NodeSpec::Workload(w)) => w,
            other => panic!("expected workload at {key}, got {other:?}"),
        }
    }

    #[test]
    fn workload_carries_tier_sizing_and_env() {
        let composition = compose(&make_config(&[(Some("tenant-c"), "premium")])).unwrap();
        let order = workload(&composition.graph, "tenant-c", "order");

        assert_eq!(order.replicas, 3);
        assert_eq!(order.limits.memory, "2Gi");
        assert_eq!(order.service_account, "order-service-account");
        assert_eq!(order.env["TABLE_NAME"], "tenant-c-orders");
        assert_eq!(
            order.env["FULFILLMENT_ENDPOINT"],
            "fulfillment-service.tenant-c.svc.cluster.local"
        );
        assert_eq!(order.env["TENANT_TAG_KEY"], "TenantID");
        assert_eq!(order.labels["tenantId"], "tenant-c");
        assert_eq!(order.labels["authorization"], "enabled");
    }

    #[test]
    fn queue_job_gets_scaling_bounds_instead_of_replicas() {
        let composition = compose(&make_config(&[(None, "basic")])).unwrap();
        let invoice = workload(&composition.graph, "basic-pool", "invoice");
        assert_eq!(invoice.replicas, 0);
        assert_eq!(invoice.job.as_ref().unwrap().max_replicas, 5);
        assert_eq!(invoice.service_account, "basic-pool-invoice-service-account");
        assert_eq!(invoice.env["QUEUE_NAME"], "basic-pool-invoice-queue");
        assert!(!invoice.labels.contains_key("authorization"));
    }

    #[test]
    fn publisher_sees_its_bus() {
        let composition = compose(&make_config(&[(Some("tenant-b"), "advanced")])).unwrap();
        let fulfillment = workload(&composition.graph, "tenant-b", "fulfillment");
        assert_eq!(fulfillment.env["EVENT_BUS_NAME"], "advanced-tier-event-bus");
        assert_eq!(fulfillment.env["EVENT_DETAIL_TYPE"], "order-fulfilled");
    }

    #[test]
    fn rejected_entry_leaves_no_nodes() {
        let composition = compose(&make_config(&[
            (Some("tenant-b"), "advanced"),
            (Some("tenant-x"), "platinum"),
        ]))
        .unwrap();

        assert_eq!(composition.rejected.len(), 1);
        assert_eq!(
            composition.rejected[0].tenant,
            TenantRef::Named {
                tenant_id: "tenant-x".to_string()
            }
        );
        assert!(
            composition
                .graph
                .nodes()
                .all(|(key, _)| key.namespace != "tenant-x" && key.name != "tenant-x")
        );
    }

    #[test]
    fn duplicate_path_prefix_in_catalog_is_a_routing_conflict() {
        let mut config = make_config(&[(None, "basic")]);
        let mut services: Vec<ServiceSpec> = ServiceCatalog::builtin().services().cloned().collect();
        for s in services.iter_mut() {
            if s.name == "product" {
                s.path_prefix = Some("/orders".to_string());
            }
        }
        config.services = services;
        config.stores = ServiceCatalog::builtin().stores().cloned().collect();

        let aborted = compose(&config).unwrap_err();
        assert_eq!(aborted.cause.kind(), "routing_conflict");
    }

    #[test]
    fn subset_selects_by_tenant_id_or_pool() {
        let config = make_config(&[
            (None, "basic"),
            (Some("tenant-b"), "advanced"),
            (Some("tenant-c"), "premium"),
        ]);
        assert!(selects("basic-pool", &config.tenants[0]));
        assert!(selects("tenant-b", &config.tenants[1]));
        assert!(!selects("tenant-b", &config.tenants[2]));

        let subset = compose_subset(&config, &["tenant-b"]).unwrap();
        let namespaces: Vec<&str> = subset
            .graph
            .of_kind(ResourceKind::Namespace)
            .map(|(k, _)| k.name.as_str())
            .collect();
        // tenant-b brings the pool serving its product and order services.
        assert_eq!(namespaces, vec!["basic-pool", "tenant-b"]);
        assert!(subset.rejected.is_empty());
    }

    #[test]
    fn advanced_tenant_reaches_product_and_order_through_the_basic_pool() {
        let composition = compose(&make_config(&[(Some("tenant-b"), "advanced")])).unwrap();
        let graph = &composition.graph;

        for service in ["product", "order"] {
            let key = NodeKey::new(ResourceKind::Workload, Some("tenant-b"), service);
            assert!(!graph.contains(&key), "{service} must not run in the silo");
            workload(graph, "basic-pool", service);
        }
        workload(graph, "tenant-b", "fulfillment");
        let invoice = workload(graph, "tenant-b", "invoice");
        assert_eq!(
            invoice.env["PRODUCT_ENDPOINT"],
            "product-service.basic-pool.svc.cluster.local"
        );
        assert!(graph.has_edge(
            &NodeKey::new(ResourceKind::Workload, Some("basic-pool"), "product"),
            &NodeKey::new(ResourceKind::Workload, Some("tenant-b"), "invoice"),
        ));

        let claims = tenantgrid_mesh::Claims::new("advanced", Some("tenant-b"));
        let rule = composition.routes.resolve("/orders/7", &claims).unwrap();
        assert_eq!(rule.name, "order-tenant-b");
        assert_eq!(rule.namespace, "basic-pool");
        assert_eq!(rule.predicate.tenant_id.as_deref(), Some("tenant-b"));
        assert_eq!(rule.destination.host, "order-service.basic-pool.svc.cluster.local");

        let route = NodeKey::new(ResourceKind::RoutingRule, Some("basic-pool"), "order-tenant-b");
        assert!(graph.has_edge(
            &NodeKey::new(ResourceKind::Workload, Some("basic-pool"), "order"),
            &route
        ));
    }

    #[test]
    fn service_entry_keeps_a_pooled_service_in_the_silo() {
        let mut config = make_config(&[(Some("tenant-b"), "advanced")]);
        let mut services: Vec<ServiceSpec> = ServiceCatalog::builtin().services().cloned().collect();
        for s in services.iter_mut() {
            if s.name == "product" {
                s.placement.insert(Tier::Advanced, PlacementMode::Siloed);
            }
        }
        config.services = services;
        config.stores = ServiceCatalog::builtin().stores().cloned().collect();

        let graph = compose(&config).unwrap().graph;
        let invoice = workload(&graph, "tenant-b", "invoice");
        assert_eq!(
            invoice.env["PRODUCT_ENDPOINT"],
            "product-service.tenant-b.svc.cluster.local"
        );
        workload(&graph, "basic-pool", "order");
    }

    #[test]
    fn shared_bus_on_a_tier_with_a_pool_aborts() {
        let mut config = make_config(&[(None, "basic"), (Some("acme"), "basic")]);
        config.tiers.insert(
            Tier::Basic,
            tenantgrid_core::config::TierOverride {
                event_bus: Some(tenantgrid_core::config::BusPlacement::Shared),
                ..Default::default()
            },
        );

        let aborted = compose(&config).unwrap_err();
        assert_eq!(aborted.cause.kind(), "invalid_placement");
        assert!(matches!(
            aborted.cause,
            ComposeError::InvalidPlacement { tier: Tier::Basic, ref service, .. } if service == "invoice"
        ));
    }

    #[test]
    fn pooling_an_event_service_for_silos_aborts() {
        let mut config = make_config(&[(Some("tenant-b"), "advanced")]);
        config.tiers.insert(
            Tier::Advanced,
            tenantgrid_core::config::TierOverride {
                services: BTreeMap::from([("fulfillment".to_string(), PlacementMode::Pooled)]),
                ..Default::default()
            },
        );

        let aborted = compose(&config).unwrap_err();
        assert_eq!(
            aborted.cause,
            ComposeError::InvalidPlacement {
                tier: Tier::Advanced,
                service: "fulfillment".to_string(),
                reason: "event publishers and consumers must run in the tenant's own namespace"
                    .to_string(),
            }
        );
    }

    #[test]
    fn aborted_run_reports_earlier_rejections() {
        let mut config = make_config(&[(Some("acme"), "gold"), (None, "basic")]);
        config.policy.tenant_tag_key = String::new();

        let aborted = compose(&config).unwrap_err();
        assert_eq!(aborted.cause.kind(), "missing_isolation_binding");
        assert_eq!(aborted.rejected.len(), 1);
        assert!(aborted.to_string().starts_with("composition aborted:"));
    }
}
