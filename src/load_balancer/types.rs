//! Selection types and error definitions.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::ServiceInstance;

/// Live telemetry for one service instance, as stored in the metrics cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceMetrics {
    /// Milliseconds.
    #[serde(alias = "response_time")]
    pub response_time: f64,
    /// Percent, 0-100.
    #[serde(alias = "error_rate")]
    pub error_rate: f64,
    /// Percent, 0-100.
    #[serde(alias = "cpu_usage")]
    pub cpu_usage: f64,
    /// Percent, 0-100.
    #[serde(alias = "memory_usage")]
    pub memory_usage: f64,
    #[serde(alias = "active_connections")]
    pub active_connections: u64,
    /// Epoch milliseconds of the last completed selection.
    #[serde(alias = "last_selected_time", skip_serializing_if = "Option::is_none")]
    pub last_selected_time: Option<u64>,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self {
            response_time: 0.0,
            error_rate: 0.0,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            active_connections: 0,
            last_selected_time: None,
        }
    }
}

/// Coefficients for the composite rank score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub health: f64,
    pub response_time: f64,
    pub error_rate: f64,
    pub resources: f64,
    pub connections: f64,
    pub distribution: f64,
}

impl WeightConfig {
    /// All coefficients, in declaration order, with their names.
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("health", self.health),
            ("response_time", self.response_time),
            ("error_rate", self.error_rate),
            ("resources", self.resources),
            ("connections", self.connections),
            ("distribution", self.distribution),
        ]
    }
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            health: 0.3,
            response_time: 0.2,
            error_rate: 0.2,
            resources: 0.1,
            connections: 0.1,
            distribution: 0.1,
        }
    }
}

/// Selection algorithm requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
    #[default]
    #[serde(alias = "rr")]
    RoundRobin,
    #[serde(alias = "lc")]
    LeastConnection,
    #[serde(alias = "wrr")]
    WeightedRoundRobin,
}

impl SelectionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionAlgorithm::RoundRobin => "round_robin",
            SelectionAlgorithm::LeastConnection => "least_connection",
            SelectionAlgorithm::WeightedRoundRobin => "weighted_round_robin",
        }
    }
}

impl std::fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an algorithm name that matches no variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown selection algorithm '{0}' (expected round_robin, least_connection or weighted_round_robin)")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for SelectionAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" | "rr" => Ok(SelectionAlgorithm::RoundRobin),
            "least_connection" | "least_connections" | "lc" => {
                Ok(SelectionAlgorithm::LeastConnection)
            }
            "weighted_round_robin" | "wrr" => Ok(SelectionAlgorithm::WeightedRoundRobin),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// An instance paired with its composite score for one selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub score: f64,
    pub id: String,
    pub instance: ServiceInstance,
}

/// A pick plus the cursor value to use on the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<T> {
    pub selected: T,
    pub next_cursor: usize,
}

/// Errors raised by the selection and scoring helpers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Every candidate failed at least one check, or there were none.
    #[error("No healthy service instances available")]
    NoHealthyInstances,

    /// Weighted draw requested over an empty ranking.
    #[error("No services available for selection")]
    NoServicesAvailable,

    /// Ranking requested for an instance absent from the metrics batch.
    #[error("Missing metrics for service instance {0}")]
    MissingMetrics(String),
}

/// Result type for selection operations.
pub type SelectionResult<T> = Result<T, SelectionError>;

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
