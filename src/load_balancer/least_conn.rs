//! Least Connections selection strategy.

use std::collections::HashMap;

use crate::discovery::ServiceInstance;
use crate::load_balancer::types::{SelectionError, SelectionResult, ServiceMetrics};

/// Selects the healthy instance with the fewest active connections.
///
/// Instances missing from `metrics_by_id` use `default_metrics`.
/// In case of tie, the first one in input order is selected (stability).
pub fn least_connection_selection<'a>(
    instances: &'a [ServiceInstance],
    metrics_by_id: &HashMap<String, ServiceMetrics>,
    default_metrics: &ServiceMetrics,
) -> SelectionResult<&'a ServiceInstance> {
    instances
        .iter()
        .filter(|i| i.is_healthy())
        .min_by_key(|i| {
            metrics_by_id
                .get(&i.id)
                .unwrap_or(default_metrics)
                .active_connections
        })
        .ok_or(SelectionError::NoHealthyInstances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{CheckStatus, HealthCheck};

    fn instance(id: &str, status: CheckStatus) -> ServiceInstance {
        ServiceInstance {
            id: id.to_string(),
            address: "127.0.0.1".to_string(),
            port: 8080,
            tags: Vec::new(),
            checks: vec![HealthCheck::new(status, "")],
        }
    }

    fn connections(n: u64) -> ServiceMetrics {
        ServiceMetrics {
            active_connections: n,
            ..ServiceMetrics::default()
        }
    }

    #[test]
    fn test_least_conn() {
        let instances = vec![
            instance("b1", CheckStatus::Passing),
            instance("b2", CheckStatus::Passing),
        ];
        let mut metrics = HashMap::new();
        metrics.insert("b1".to_string(), connections(1));
        metrics.insert("b2".to_string(), connections(0));

        // Should pick b2 (0 connections)
        let s1 = least_connection_selection(&instances, &metrics, &ServiceMetrics::default()).unwrap();
        assert_eq!(s1.id, "b2");

        // now b2 has 2, b1 has 1
        metrics.insert("b2".to_string(), connections(2));
        let s2 = least_connection_selection(&instances, &metrics, &ServiceMetrics::default()).unwrap();
        assert_eq!(s2.id, "b1");
    }

    #[test]
    fn test_tie_goes_to_first() {
        let instances = vec![
            instance("b1", CheckStatus::Passing),
            instance("b2", CheckStatus::Passing),
            instance("b3", CheckStatus::Passing),
        ];
        let mut metrics = HashMap::new();
        metrics.insert("b1".to_string(), connections(4));
        metrics.insert("b2".to_string(), connections(2));
        metrics.insert("b3".to_string(), connections(2));

        let selected = least_connection_selection(&instances, &metrics, &ServiceMetrics::default()).unwrap();
        assert_eq!(selected.id, "b2");
    }

    #[test]
    fn test_default_metrics_and_health_filter() {
        let instances = vec![
            instance("idle-but-sick", CheckStatus::Critical),
            instance("busy", CheckStatus::Passing),
            instance("unknown", CheckStatus::Passing),
        ];
        let mut metrics = HashMap::new();
        metrics.insert("idle-but-sick".to_string(), connections(0));
        metrics.insert("busy".to_string(), connections(9));

        // "unknown" falls back to the default of 5 connections.
        let selected = least_connection_selection(&instances, &metrics, &connections(5)).unwrap();
        assert_eq!(selected.id, "unknown");

        let sick = vec![instance("x", CheckStatus::Critical)];
        assert_eq!(
            least_connection_selection(&sick, &metrics, &ServiceMetrics::default()).unwrap_err(),
            SelectionError::NoHealthyInstances
        );
    }
}
