//! Service catalog: the microservices every tenant namespace receives and
//! the data stores they touch.

use std::collections::BTreeMap;

use crate::config::{
    DataAccess, EventSource, ServiceSpec, StoreKind, StoreSpec, TenantGridConfig, WorkloadKind,
};
use crate::error::{ComposeError, ComposeResult};

/// Validated, name-indexed catalog.
///
/// Every reference (service dependency, store, queue, consumed event) points
/// at something declared in the catalog. Dependency cycles are not checked
/// here; the graph builder owns that.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCatalog {
    services: BTreeMap<String, ServiceSpec>,
    stores: BTreeMap<String, StoreSpec>,
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceSpec>, stores: Vec<StoreSpec>) -> ComposeResult<Self> {
        let services: BTreeMap<String, ServiceSpec> =
            services.into_iter().map(|s| (s.name.clone(), s)).collect();
        let stores: BTreeMap<String, StoreSpec> =
            stores.into_iter().map(|s| (s.name.clone(), s)).collect();
        let catalog = Self { services, stores };
        catalog.check_references()?;
        Ok(catalog)
    }

    /// Catalog from config, falling back to the built-in application.
    pub fn from_config(config: &TenantGridConfig) -> ComposeResult<Self> {
        if config.services.is_empty() {
            return Ok(Self::builtin());
        }
        Self::new(config.services.clone(), config.stores.clone())
    }

    /// The order/product/fulfillment/invoice application.
    pub fn builtin() -> Self {
        let services = builtin_services()
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        let stores = builtin_stores()
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        Self { services, stores }
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.get(name)
    }

    pub fn store(&self, name: &str) -> Option<&StoreSpec> {
        self.stores.get(name)
    }

    pub fn stores(&self) -> impl Iterator<Item = &StoreSpec> {
        self.stores.values()
    }

    /// Service that publishes the given event, if any.
    pub fn publisher_of(&self, event: &EventSource) -> Option<&ServiceSpec> {
        self.services
            .values()
            .find(|s| s.publishes.as_ref() == Some(event))
    }

    /// Event bus store published to by services, if one is declared.
    pub fn event_bus(&self) -> Option<&StoreSpec> {
        self.stores.values().find(|s| s.kind == StoreKind::EventBus)
    }

    fn check_references(&self) -> ComposeResult<()> {
        for service in self.services.values() {
            let unknown = |dependency: String| ComposeError::UnknownDependency {
                service: service.name.clone(),
                dependency,
            };

            for dep in &service.depends_on {
                if !self.services.contains_key(dep) {
                    return Err(unknown(format!("service {dep}")));
                }
            }
            for access in &service.data {
                if !self.stores.contains_key(&access.store) {
                    return Err(unknown(format!("store {}", access.store)));
                }
            }
            if let Some(queue) = &service.queue {
                match self.stores.get(queue) {
                    Some(store) if store.kind == StoreKind::Queue => {}
                    _ => return Err(unknown(format!("queue {queue}"))),
                }
            }
            if service.publishes.is_some() && self.event_bus().is_none() {
                return Err(unknown("event bus".to_string()));
            }
            if !service.consumes.is_empty() && service.queue.is_none() {
                return Err(unknown("queue for consumed events".to_string()));
            }
            for event in &service.consumes {
                if self.publisher_of(event).is_none() {
                    return Err(unknown(format!(
                        "event {}/{}",
                        event.source, event.detail_type
                    )));
                }
            }
        }
        Ok(())
    }
}

fn builtin_services() -> Vec<ServiceSpec> {
    let fulfilled = EventSource {
        source: "fulfillment-service".to_string(),
        detail_type: "order-fulfilled".to_string(),
    };
    vec![
        ServiceSpec {
            name: "product".to_string(),
            kind: WorkloadKind::Deployment,
            image: "saas-microservices/product:latest".to_string(),
            path_prefix: Some("/products".to_string()),
            port: 8080,
            queue: None,
            depends_on: Vec::new(),
            data: vec![access("products", &["dynamodb:Query", "dynamodb:PutItem"])],
            publishes: None,
            consumes: Vec::new(),
            placement: BTreeMap::new(),
        },
        ServiceSpec {
            name: "order".to_string(),
            kind: WorkloadKind::Deployment,
            image: "saas-microservices/order:latest".to_string(),
            path_prefix: Some("/orders".to_string()),
            port: 8080,
            queue: None,
            depends_on: vec!["fulfillment".to_string()],
            data: vec![access("orders", &["dynamodb:Query", "dynamodb:PutItem"])],
            publishes: None,
            consumes: Vec::new(),
            placement: BTreeMap::new(),
        },
        ServiceSpec {
            name: "fulfillment".to_string(),
            kind: WorkloadKind::Deployment,
            image: "saas-microservices/fulfillment:latest".to_string(),
            path_prefix: Some("/fulfillments".to_string()),
            port: 8080,
            queue: None,
            depends_on: Vec::new(),
            data: vec![access("event-bus", &["events:PutEvents"])],
            publishes: Some(fulfilled.clone()),
            consumes: Vec::new(),
            placement: BTreeMap::new(),
        },
        ServiceSpec {
            name: "invoice".to_string(),
            kind: WorkloadKind::QueueJob,
            image: "saas-microservices/invoice:latest".to_string(),
            path_prefix: None,
            port: 8080,
            queue: Some("invoice-queue".to_string()),
            depends_on: vec!["product".to_string()],
            data: vec![access(
                "invoice-queue",
                &["sqs:ReceiveMessage", "sqs:DeleteMessage"],
            )],
            publishes: None,
            consumes: vec![fulfilled],
            placement: BTreeMap::new(),
        },
    ]
}

fn builtin_stores() -> Vec<StoreSpec> {
    let tenant_key = Some("tenantId".to_string());
    vec![
        StoreSpec {
            name: "products".to_string(),
            kind: StoreKind::Table,
            provisioning: None,
            tenant_key: tenant_key.clone(),
        },
        StoreSpec {
            name: "orders".to_string(),
            kind: StoreKind::Table,
            provisioning: None,
            tenant_key: tenant_key.clone(),
        },
        StoreSpec {
            name: "invoice-queue".to_string(),
            kind: StoreKind::Queue,
            provisioning: None,
            tenant_key: tenant_key.clone(),
        },
        StoreSpec {
            name: "event-bus".to_string(),
            kind: StoreKind::EventBus,
            provisioning: None,
            tenant_key,
        },
    ]
}

fn access(store: &str, actions: &[&str]) -> DataAccess {
    DataAccess {
        store: store.to_string(),
        actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_self_consistent() {
        let builtin = ServiceCatalog::builtin();
        let services: Vec<ServiceSpec> = builtin.services().cloned().collect();
        let stores: Vec<StoreSpec> = builtin.stores().cloned().collect();
        let rebuilt = ServiceCatalog::new(services, stores).unwrap();
        assert_eq!(rebuilt, builtin);
    }

    #[test]
    fn invoice_consumes_fulfillment_events() {
        let catalog = ServiceCatalog::builtin();
        let invoice = catalog.service("invoice").unwrap();
        let publisher = catalog.publisher_of(&invoice.consumes[0]).unwrap();
        assert_eq!(publisher.name, "fulfillment");
    }

    #[test]
    fn unknown_service_dependency_is_rejected() {
        let mut services = builtin_services();
        services[1].depends_on.push("shipping".to_string());
        let err = ServiceCatalog::new(services, builtin_stores()).unwrap_err();
        assert_eq!(
            err,
            ComposeError::UnknownDependency {
                service: "order".to_string(),
                dependency: "service shipping".to_string(),
            }
        );
    }

    #[test]
    fn consumer_without_queue_is_rejected() {
        let mut services = builtin_services();
        services[3].queue = None;
        let err = ServiceCatalog::new(services, builtin_stores()).unwrap_err();
        assert_eq!(err.kind(), "unknown_dependency");
    }

    #[test]
    fn empty_config_uses_builtin_catalog() {
        let catalog = ServiceCatalog::from_config(&TenantGridConfig::default()).unwrap();
        assert_eq!(catalog.services().count(), 4);
        assert!(catalog.event_bus().is_some());
    }
}
