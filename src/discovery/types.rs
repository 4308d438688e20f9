//! Registration shapes shared by the directory and DNS providers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use std::time::Duration;

/// Status reported by a directory health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Passing,
    Warning,
    Critical,
    Maintenance,
    /// Any status string the directory invents later.
    #[serde(other)]
    Unknown,
}

/// A single health check attached to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: CheckStatus,
    #[serde(default)]
    pub output: String,
}

impl HealthCheck {
    pub fn new(status: CheckStatus, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn is_passing(&self) -> bool {
        self.status == CheckStatus::Passing
    }
}

/// A health-checked registration returned by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Directory-assigned instance id; also the metrics key.
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Checks in directory order.
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

impl ServiceInstance {
    /// True when every check passes. An instance without checks is not filtered out.
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(HealthCheck::is_passing)
    }

    /// Number of passing checks.
    pub fn passing_checks(&self) -> usize {
        self.checks.iter().filter(|c| c.is_passing()).count()
    }
}

/// A DNS SRV answer with its target already resolved to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvRecord {
    /// Target name; the metrics key on the SRV-only path.
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Lower value is preferred.
    #[serde(default)]
    pub priority: u16,
    /// Relative share within a priority tier.
    #[serde(default)]
    pub weight: u16,
}

/// Address handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }
}

impl From<&SrvRecord> for Endpoint {
    fn from(record: &SrvRecord) -> Self {
        Self::new(record.ip.clone(), record.port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Errors raised by discovery providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport or status error talking to the directory.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// DNS query failed for a reason other than an empty answer.
    #[error("DNS error: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),

    /// Provider did not answer within the deadline.
    #[error("Provider timeout after {0:?}")]
    Timeout(Duration),

    /// Provider address could not be used to build a request.
    #[error("Invalid provider address: {0}")]
    InvalidAddress(String),

    /// Provider answered with something we could not interpret.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
