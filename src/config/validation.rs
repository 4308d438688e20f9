//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (weights ≥ 0, TTLs > 0, addresses parse)
//! - Reject combinations that cannot work (shared cursor without a cache)
//! - Detect duplicate registrations in the static catalog
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResolverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CursorScope, ResolverConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("weight '{name}' must be a finite non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("default metric '{name}' must be within [0, {max}], got {value}")]
    InvalidDefaultMetric { name: &'static str, value: f64, max: f64 },

    #[error("cache prefix must not be empty")]
    EmptyPrefix,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("shared cursor scope requires the cache to be enabled")]
    SharedCursorWithoutCache,

    #[error("invalid consul address '{0}'")]
    InvalidConsulAddress(String),

    #[error("invalid DNS nameserver '{0}', expected ip:port")]
    InvalidNameserver(String),

    #[error("DNS domain template '{0}' must contain {{service}}")]
    InvalidDomainTemplate(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("catalog service name must not be empty")]
    EmptyServiceName,

    #[error("catalog service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("catalog service '{service}' declares instance id '{id}' more than once")]
    DuplicateInstance { service: String, id: String },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ResolverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, value) in config.weights.entries() {
        if !value.is_finite() || value < 0.0 {
            errors.push(ValidationError::InvalidWeight { name, value });
        }
    }

    let defaults = &config.default_metrics;
    let bounded = [
        ("response_time", defaults.response_time, f64::MAX),
        ("error_rate", defaults.error_rate, 100.0),
        ("cpu_usage", defaults.cpu_usage, 100.0),
        ("memory_usage", defaults.memory_usage, 100.0),
    ];
    for (name, value, max) in bounded {
        if !value.is_finite() || !(0.0..=max).contains(&value) {
            errors.push(ValidationError::InvalidDefaultMetric { name, value, max });
        }
    }

    let cache = &config.cache;
    if cache.prefix.trim().is_empty() {
        errors.push(ValidationError::EmptyPrefix);
    }
    if cache.metrics_ttl_secs == 0 {
        errors.push(ValidationError::ZeroDuration("cache.metrics_ttl_secs"));
    }
    if cache.discovery_ttl_secs == 0 {
        errors.push(ValidationError::ZeroDuration("cache.discovery_ttl_secs"));
    }
    if cache.lookup_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration("cache.lookup_timeout_ms"));
    }
    if config.resolver.provider_timeout_ms == 0 {
        errors.push(ValidationError::ZeroDuration("resolver.provider_timeout_ms"));
    }
    if config.resolver.cursor_scope == CursorScope::Shared && !cache.enabled {
        errors.push(ValidationError::SharedCursorWithoutCache);
    }

    if config.consul.enabled {
        if url::Url::parse(&config.consul.address).is_err() {
            errors.push(ValidationError::InvalidConsulAddress(config.consul.address.clone()));
        }
        if config.consul.timeout_secs == 0 {
            errors.push(ValidationError::ZeroDuration("consul.timeout_secs"));
        }
    }

    let dns = &config.dns;
    if dns.enabled || config.consul.enabled {
        if !dns.nameserver.is_empty() && dns.nameserver.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidNameserver(dns.nameserver.clone()));
        }
        if !dns.domain_template.contains("{service}") {
            errors.push(ValidationError::InvalidDomainTemplate(dns.domain_template.clone()));
        }
        if dns.timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration("dns.timeout_ms"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut services = HashSet::new();
    for service in &config.catalog.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName);
        } else if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        let mut ids = HashSet::new();
        for instance in &service.instances {
            if !ids.insert(instance.id.as_str()) {
                errors.push(ValidationError::DuplicateInstance {
                    service: service.name.clone(),
                    id: instance.id.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
