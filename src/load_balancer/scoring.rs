//! Composite scoring of service instances.
//!
//! # Responsibilities
//! - Normalize raw telemetry into [0, 1] sub-scores
//! - Combine sub-scores into a rank score using `WeightConfig`
//! - Blend directory health with DNS weight
//!
//! # Design Decisions
//! - Pure functions; no I/O, no clock reads except the `_at`-less wrappers
//! - Lower raw latency, errors, load and connections score higher (inverse normalization)
//! - Ranking is a stable sort, so ties keep input order

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::discovery::ServiceInstance;
use crate::load_balancer::types::{
    epoch_millis, RankedCandidate, SelectionError, SelectionResult, ServiceMetrics, WeightConfig,
};

/// Response time at which the latency sub-score bottoms out.
pub const RESPONSE_TIME_CEILING_MS: f64 = 500.0;
/// Error rate and resource usage are percentages.
pub const PERCENT_CEILING: f64 = 100.0;
/// Connection count at which the connection sub-score bottoms out.
pub const CONNECTION_CEILING: f64 = 1000.0;
/// Window over which a just-selected instance recovers full distribution score.
pub const DISTRIBUTION_WINDOW_MS: u64 = 300_000;

const HEALTH_BLEND: f64 = 0.7;
const DNS_BLEND: f64 = 0.3;

/// Clamp `value / max` to [0, 1], inverted when lower raw values are better.
///
/// NaN and a non-positive `max` count as 0 before inversion; infinities clamp.
pub fn normalize_score(value: f64, max: f64, inverse: bool) -> f64 {
    let clamped = if max > 0.0 && !value.is_nan() {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    };
    if inverse {
        1.0 - clamped
    } else {
        clamped
    }
}

/// Share of passing checks; 0 for an instance with no checks.
pub fn calculate_health_score(instance: &ServiceInstance) -> f64 {
    if instance.checks.is_empty() {
        return 0.0;
    }
    instance.passing_checks() as f64 / instance.checks.len() as f64
}

/// Average CPU and memory headroom.
pub fn calculate_resource_score(metrics: &ServiceMetrics) -> f64 {
    let cpu = normalize_score(metrics.cpu_usage, PERCENT_CEILING, true);
    let memory = normalize_score(metrics.memory_usage, PERCENT_CEILING, true);
    (cpu + memory) / 2.0
}

/// Distribution score against the current clock.
pub fn calculate_distribution_score(last_selected: Option<u64>) -> f64 {
    calculate_distribution_score_at(last_selected, epoch_millis())
}

/// 1 for a never-selected instance; otherwise recovers linearly from 0 over
/// `DISTRIBUTION_WINDOW_MS` after the last selection.
pub fn calculate_distribution_score_at(last_selected: Option<u64>, now_ms: u64) -> f64 {
    match last_selected {
        None => 1.0,
        Some(at) => {
            let elapsed = now_ms.saturating_sub(at) as f64;
            (elapsed / DISTRIBUTION_WINDOW_MS as f64).min(1.0)
        }
    }
}

/// Composite score for one instance.
pub fn composite_score(
    instance: &ServiceInstance,
    metrics: &ServiceMetrics,
    weights: &WeightConfig,
    now_ms: u64,
) -> f64 {
    calculate_health_score(instance) * weights.health
        + normalize_score(metrics.response_time, RESPONSE_TIME_CEILING_MS, true)
            * weights.response_time
        + normalize_score(metrics.error_rate, PERCENT_CEILING, true) * weights.error_rate
        + calculate_resource_score(metrics) * weights.resources
        + normalize_score(metrics.active_connections as f64, CONNECTION_CEILING, true)
            * weights.connections
        + calculate_distribution_score_at(metrics.last_selected_time, now_ms)
            * weights.distribution
}

/// Rank instances by composite score, best first.
pub fn rank_services(
    instances: &[ServiceInstance],
    metrics_by_id: &HashMap<String, ServiceMetrics>,
    weights: &WeightConfig,
) -> SelectionResult<Vec<RankedCandidate>> {
    rank_services_at(instances, metrics_by_id, weights, epoch_millis())
}

/// `rank_services` with an explicit clock.
pub fn rank_services_at(
    instances: &[ServiceInstance],
    metrics_by_id: &HashMap<String, ServiceMetrics>,
    weights: &WeightConfig,
    now_ms: u64,
) -> SelectionResult<Vec<RankedCandidate>> {
    let mut ranked = instances
        .iter()
        .map(|instance| {
            let metrics = metrics_by_id
                .get(&instance.id)
                .ok_or_else(|| SelectionError::MissingMetrics(instance.id.clone()))?;
            Ok(RankedCandidate {
                score: composite_score(instance, metrics, weights, now_ms),
                id: instance.id.clone(),
                instance: instance.clone(),
            })
        })
        .collect::<SelectionResult<Vec<_>>>()?;

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    Ok(ranked)
}

/// Blend live health (70%) with the DNS-declared weight share (30%).
pub fn combine_health_and_dns_weights(
    instance: &ServiceInstance,
    dns_weight: f64,
    max_dns_weight: f64,
) -> f64 {
    let dns_share = if max_dns_weight > 0.0 {
        dns_weight / max_dns_weight
    } else {
        0.0
    };
    HEALTH_BLEND * calculate_health_score(instance) + DNS_BLEND * dns_share
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{CheckStatus, HealthCheck};

    fn instance(id: &str, statuses: &[CheckStatus]) -> ServiceInstance {
        ServiceInstance {
            id: id.to_string(),
            address: format!("10.0.0.{}", id.len()),
            port: 80,
            tags: Vec::new(),
            checks: statuses.iter().map(|s| HealthCheck::new(*s, "")).collect(),
        }
    }

    #[test]
    fn test_normalize_score() {
        assert_eq!(normalize_score(250.0, 500.0, false), 0.5);
        assert_eq!(normalize_score(750.0, 500.0, false), 1.0);
        assert_eq!(normalize_score(-5.0, 500.0, false), 0.0);
        assert_eq!(normalize_score(f64::NAN, 500.0, false), 0.0);
        assert_eq!(normalize_score(10.0, 0.0, false), 0.0);
        // Infinities saturate like any other out-of-range value.
        assert_eq!(normalize_score(f64::INFINITY, 500.0, false), 1.0);
        assert_eq!(normalize_score(f64::INFINITY, 500.0, true), 0.0);
        assert_eq!(normalize_score(f64::NEG_INFINITY, 500.0, false), 0.0);
        assert_eq!(normalize_score(f64::NAN, 500.0, true), 1.0);

        let mut previous = 0.0;
        for v in 0..=120 {
            let score = normalize_score(v as f64 * 5.0, 500.0, false);
            assert!(score >= previous);
            assert!((0.0..=1.0).contains(&score));
            assert_eq!(normalize_score(v as f64 * 5.0, 500.0, true), 1.0 - score);
            previous = score;
        }
    }

    #[test]
    fn test_health_score() {
        use CheckStatus::*;
        assert_eq!(calculate_health_score(&instance("a", &[])), 0.0);
        assert_eq!(calculate_health_score(&instance("a", &[Passing, Passing])), 1.0);
        assert_eq!(calculate_health_score(&instance("a", &[Passing, Critical])), 0.5);
    }

    #[test]
    fn test_resource_score() {
        let metrics = ServiceMetrics {
            cpu_usage: 50.0,
            memory_usage: 100.0,
            ..ServiceMetrics::default()
        };
        assert_eq!(calculate_resource_score(&metrics), 0.25);
        assert_eq!(calculate_resource_score(&ServiceMetrics::default()), 1.0);
    }

    #[test]
    fn test_distribution_score() {
        let now = epoch_millis();
        assert_eq!(calculate_distribution_score(None), 1.0);
        assert!(calculate_distribution_score(Some(now)) < 0.1);
        assert_eq!(calculate_distribution_score_at(Some(now - 300_000), now), 1.0);
        assert_eq!(calculate_distribution_score_at(Some(now - 3_600_000), now), 1.0);
        assert_eq!(calculate_distribution_score_at(Some(now - 150_000), now), 0.5);
        // Clock skew: a timestamp from the future counts as just selected.
        assert_eq!(calculate_distribution_score_at(Some(now + 10), now), 0.0);
    }

    #[test]
    fn test_rank_services_orders_by_score() {
        use CheckStatus::*;
        let instances = vec![
            instance("slow", &[Passing]),
            instance("fast", &[Passing]),
            instance("sick", &[Critical]),
        ];
        let mut metrics = HashMap::new();
        metrics.insert(
            "slow".to_string(),
            ServiceMetrics {
                response_time: 400.0,
                ..ServiceMetrics::default()
            },
        );
        metrics.insert("fast".to_string(), ServiceMetrics::default());
        metrics.insert("sick".to_string(), ServiceMetrics::default());

        let ranked = rank_services_at(&instances, &metrics, &WeightConfig::default(), 0).unwrap();
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["fast", "slow", "sick"]);
        assert!((ranked[0].score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_services_ties_keep_input_order() {
        let instances = vec![instance("b", &[]), instance("a", &[]), instance("c", &[])];
        let metrics: HashMap<String, ServiceMetrics> = ["a", "b", "c"]
            .iter()
            .map(|id| (id.to_string(), ServiceMetrics::default()))
            .collect();

        let ranked = rank_services_at(&instances, &metrics, &WeightConfig::default(), 0).unwrap();
        let order: Vec<&str> = ranked.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_rank_services_missing_metrics() {
        let instances = vec![instance("a", &[])];
        let err = rank_services(&instances, &HashMap::new(), &WeightConfig::default()).unwrap_err();
        assert_eq!(err, SelectionError::MissingMetrics("a".into()));
    }

    #[test]
    fn test_combine_health_and_dns_weights() {
        use CheckStatus::*;
        let healthy = instance("a", &[Passing]);
        assert!((combine_health_and_dns_weights(&healthy, 10.0, 10.0) - 1.0).abs() < 1e-9);
        assert!((combine_health_and_dns_weights(&healthy, 5.0, 10.0) - 0.85).abs() < 1e-9);
        assert!((combine_health_and_dns_weights(&healthy, 5.0, 0.0) - 0.7).abs() < 1e-9);
    }
}
