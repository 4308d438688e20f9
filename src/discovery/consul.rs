//! Consul health endpoint client.
//!
//! # Responsibilities
//! - Query `/v1/health/service/{name}` on a Consul agent
//! - Map Consul entries onto `ServiceInstance`
//!
//! # Design Decisions
//! - Service address falls back to the node address when unset (Consul semantics)
//! - No retries here; the resolver bounds the call and degrades to an empty list

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::ConsulConfig;
use crate::discovery::types::{
    CheckStatus, HealthCheck, ProviderError, ProviderResult, ServiceInstance,
};
use crate::discovery::HealthProvider;

const TOKEN_HEADER: &str = "X-Consul-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulEntry {
    node: ConsulNode,
    service: ConsulService,
    #[serde(default)]
    checks: Vec<ConsulCheck>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulNode {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulService {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConsulCheck {
    status: CheckStatus,
    #[serde(default)]
    output: String,
}

impl From<ConsulEntry> for ServiceInstance {
    fn from(entry: ConsulEntry) -> Self {
        let address = if entry.service.address.is_empty() {
            entry.node.address
        } else {
            entry.service.address
        };
        Self {
            id: entry.service.id,
            address,
            port: entry.service.port,
            tags: entry.service.tags.unwrap_or_default(),
            checks: entry
                .checks
                .into_iter()
                .map(|c| HealthCheck::new(c.status, c.output))
                .collect(),
        }
    }
}

/// Health provider backed by a Consul agent.
#[derive(Debug, Clone)]
pub struct ConsulHealthProvider {
    client: reqwest::Client,
    base_url: Url,
    passing_only: bool,
    token: Option<String>,
}

impl ConsulHealthProvider {
    /// Create a client for the agent in `config`.
    pub fn new(config: &ConsulConfig) -> ProviderResult<Self> {
        let base_url: Url = config.address.parse().map_err(|e| {
            ProviderError::InvalidAddress(format!("'{}': {}", config.address, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::InvalidAddress(config.address.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            passing_only: config.passing_only,
            token: config.token.clone(),
        })
    }

    fn health_url(&self, service: &str) -> ProviderResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidAddress(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "health", "service", service]);
        if self.passing_only {
            url.query_pairs_mut().append_key_only("passing");
        }
        Ok(url)
    }
}

#[async_trait]
impl HealthProvider for ConsulHealthProvider {
    async fn get_health_checks(&self, service: &str) -> ProviderResult<Vec<ServiceInstance>> {
        let url = self.health_url(service)?;
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?.error_for_status()?;
        let entries: Vec<ConsulEntry> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        tracing::debug!(url = %url, instances = entries.len(), "Consul health query answered");
        Ok(entries.into_iter().map(ServiceInstance::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str, passing_only: bool) -> ConsulConfig {
        ConsulConfig {
            enabled: true,
            address: address.to_string(),
            timeout_secs: 1,
            passing_only,
            token: None,
        }
    }

    #[test]
    fn test_health_url() {
        let provider = ConsulHealthProvider::new(&config("http://127.0.0.1:8500/", false)).unwrap();
        assert_eq!(
            provider.health_url("api").unwrap().as_str(),
            "http://127.0.0.1:8500/v1/health/service/api"
        );

        let provider = ConsulHealthProvider::new(&config("http://consul.local", true)).unwrap();
        assert_eq!(
            provider.health_url("a b").unwrap().as_str(),
            "http://consul.local/v1/health/service/a%20b?passing"
        );
    }

    #[test]
    fn test_invalid_address() {
        let err = ConsulHealthProvider::new(&config("not a url", false)).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidAddress(_)));
    }

    #[test]
    fn test_entry_mapping() {
        let raw = r#"[{
            "Node": {"Node": "n1", "Address": "10.1.0.1"},
            "Service": {"ID": "api-1", "Service": "api", "Address": "", "Port": 9000, "Tags": null},
            "Checks": [
                {"CheckID": "serfHealth", "Status": "passing", "Output": "Agent alive"},
                {"CheckID": "service:api-1", "Status": "critical", "Output": "connection refused"}
            ]
        }]"#;
        let entries: Vec<ConsulEntry> = serde_json::from_str(raw).unwrap();
        let instance = ServiceInstance::from(entries.into_iter().next().unwrap());

        assert_eq!(instance.id, "api-1");
        assert_eq!(instance.address, "10.1.0.1");
        assert_eq!(instance.port, 9000);
        assert!(instance.tags.is_empty());
        assert_eq!(instance.checks.len(), 2);
        assert_eq!(instance.checks[1].status, CheckStatus::Critical);
        assert!(!instance.is_healthy());
    }
}
