//! Static registrations loaded from configuration.
//!
//! The catalog answers both directory and DNS queries from memory. The whole
//! registration table is swapped atomically on config reload, so readers see
//! either the old table or the new one.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::discovery::types::{ProviderResult, ServiceInstance, SrvRecord};
use crate::discovery::{DnsProvider, HealthProvider};

/// Registrations for one service name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CatalogService {
    pub name: String,

    /// Directory view: health-checked instances.
    #[serde(default)]
    pub instances: Vec<ServiceInstance>,

    /// DNS view: SRV records.
    #[serde(default)]
    pub srv: Vec<SrvRecord>,
}

/// In-memory provider backed by a hot-swappable table.
#[derive(Debug)]
pub struct StaticCatalog {
    services: ArcSwap<HashMap<String, CatalogService>>,
}

impl StaticCatalog {
    pub fn new(services: Vec<CatalogService>) -> Self {
        Self {
            services: ArcSwap::from_pointee(index(services)),
        }
    }

    /// Replace every registration at once.
    pub fn replace(&self, services: Vec<CatalogService>) {
        let table = index(services);
        tracing::info!(services = table.len(), "Catalog registrations replaced");
        self.services.store(Arc::new(table));
    }

    /// Names of all registered services, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.load().keys().cloned().collect();
        names.sort();
        names
    }
}

fn index(services: Vec<CatalogService>) -> HashMap<String, CatalogService> {
    services
        .into_iter()
        .map(|service| (service.name.clone(), service))
        .collect()
}

#[async_trait]
impl HealthProvider for StaticCatalog {
    async fn get_health_checks(&self, service: &str) -> ProviderResult<Vec<ServiceInstance>> {
        Ok(self
            .services
            .load()
            .get(service)
            .map(|s| s.instances.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DnsProvider for StaticCatalog {
    async fn resolve_dns(&self, service: &str) -> ProviderResult<Vec<SrvRecord>> {
        Ok(self
            .services
            .load()
            .get(service)
            .map(|s| s.srv.clone())
            .unwrap_or_default())
    }
}
