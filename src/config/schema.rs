//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resolver.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::discovery::catalog::CatalogService;
use crate::load_balancer::{SelectionAlgorithm, ServiceMetrics, WeightConfig};

/// Root configuration for the service resolver.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// Selection behavior.
    pub resolver: SelectionConfig,

    /// Composite score coefficients.
    pub weights: WeightConfig,

    /// Metrics assumed for instances with no stored record.
    pub default_metrics: ServiceMetrics,

    /// Metrics cache and read-through discovery cache.
    pub cache: CacheConfig,

    /// Consul directory client.
    pub consul: ConsulConfig,

    /// SRV lookups against a DNS server.
    pub dns: DnsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static registrations.
    pub catalog: CatalogConfig,
}

/// Where the round-robin cursor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorScope {
    /// Per-process; no store round trips, no cross-process fairness.
    #[default]
    Local,
    /// In the key-value store; shared by every resolver on the same prefix.
    Shared,
}

/// Selection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Algorithm used when the caller does not pass one.
    pub default_algorithm: SelectionAlgorithm,

    pub cursor_scope: CursorScope,

    /// Deadline for each directory/DNS provider call in milliseconds.
    pub provider_timeout_ms: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            default_algorithm: SelectionAlgorithm::RoundRobin,
            cursor_scope: CursorScope::Local,
            provider_timeout_ms: 2000,
        }
    }
}

/// How connection counts are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterMode {
    /// Inside the JSON metrics blob (read-modify-write).
    #[default]
    Embedded,
    /// In a separate integer key mutated with `incr_by`.
    Atomic,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every read misses and every write is dropped.
    pub enabled: bool,

    /// Key prefix for everything this resolver stores.
    pub prefix: String,

    /// Sliding TTL of metrics records in seconds.
    pub metrics_ttl_secs: u64,

    /// TTL of read-through directory/DNS entries in seconds.
    pub discovery_ttl_secs: u64,

    /// Deadline for a read-through cache lookup in milliseconds.
    pub lookup_timeout_ms: u64,

    pub counter_mode: CounterMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "service-resolver".to_string(),
            metrics_ttl_secs: 24 * 60 * 60,
            discovery_ttl_secs: 10,
            lookup_timeout_ms: 50,
            counter_mode: CounterMode::Embedded,
        }
    }
}

/// Consul directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Use Consul instead of the static catalog for health data.
    pub enabled: bool,

    /// Agent base URL.
    pub address: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,

    /// Ask Consul to filter out instances with non-passing checks.
    pub passing_only: bool,

    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "http://127.0.0.1:8500".to_string(),
            timeout_secs: 5,
            passing_only: false,
            token: None,
        }
    }
}

/// DNS SRV provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Query SRV records over DNS. Implied when Consul is enabled.
    pub enabled: bool,

    /// `ip:port` of the server to ask; empty uses the system resolver.
    pub nameserver: String,

    /// Query name, `{service}` is replaced by the service name.
    pub domain_template: String,

    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            nameserver: "127.0.0.1:8600".to_string(),
            domain_template: "{service}.service.consul".to_string(),
            timeout_ms: 2000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Static registrations served by the in-memory catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub services: Vec<CatalogService>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.metrics_ttl_secs, 86_400);
        assert_eq!(config.resolver.default_algorithm, SelectionAlgorithm::RoundRobin);
        assert_eq!(config.default_metrics.active_connections, 0);
        assert!(!config.consul.enabled);
        assert!(!config.dns.enabled);
        assert_eq!(config.dns.nameserver, "127.0.0.1:8600");
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            [resolver]
            default_algorithm = "wrr"
            cursor_scope = "shared"

            [weights]
            health = 0.5
            distribution = 0.0

            [default_metrics]
            response_time = 100.0
            active_connections = 2

            [cache]
            counter_mode = "atomic"

            [dns]
            enabled = true
            nameserver = "10.0.0.53:53"

            [[catalog.services]]
            name = "api"

            [[catalog.services.instances]]
            id = "api-1"
            address = "10.0.0.1"
            port = 8080
            checks = [{ status = "passing", output = "ok" }]

            [[catalog.services.srv]]
            name = "api-1.node"
            ip = "10.0.0.1"
            port = 8080
            priority = 10
            weight = 5
        "#;
        let config: ResolverConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.resolver.default_algorithm, SelectionAlgorithm::WeightedRoundRobin);
        assert_eq!(config.resolver.cursor_scope, CursorScope::Shared);
        assert_eq!(config.weights.health, 0.5);
        // Unset coefficients keep their defaults.
        assert_eq!(config.weights.error_rate, 0.2);
        assert_eq!(config.default_metrics.response_time, 100.0);
        assert_eq!(config.default_metrics.active_connections, 2);
        assert_eq!(config.cache.counter_mode, CounterMode::Atomic);
        assert!(config.dns.enabled);
        assert_eq!(config.dns.nameserver, "10.0.0.53:53");
        assert_eq!(config.dns.domain_template, "{service}.service.consul");

        let service = &config.catalog.services[0];
        assert_eq!(service.instances[0].checks.len(), 1);
        assert_eq!(service.srv[0].weight, 5);
    }
}
