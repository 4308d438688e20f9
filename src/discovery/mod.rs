//! Discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver asks for a service name
//!     → HealthProvider (consul.rs or catalog.rs)
//!         → health-checked ServiceInstance list
//!     → DnsProvider (dns.rs or catalog.rs)
//!         → SrvRecord list (priority + weight)
//! ```
//!
//! # Design Decisions
//! - Providers are traits; the resolver never sees wire formats
//! - An unknown service is an empty list, not an error
//! - Health checks are reported, never executed here

pub mod catalog;
pub mod consul;
pub mod dns;
pub mod types;

use async_trait::async_trait;

pub use catalog::StaticCatalog;
pub use consul::ConsulHealthProvider;
pub use dns::SrvDnsProvider;
pub use types::{
    CheckStatus, Endpoint, HealthCheck, ProviderError, ProviderResult, ServiceInstance, SrvRecord,
};

/// Source of health-checked registrations for a service name.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    async fn get_health_checks(&self, service: &str) -> ProviderResult<Vec<ServiceInstance>>;
}

/// Source of SRV records for a service name.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn resolve_dns(&self, service: &str) -> ProviderResult<Vec<SrvRecord>>;
}
