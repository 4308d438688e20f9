//! Injectable observer for selection outcomes and swallowed errors.
//!
//! The resolver never fails to its caller, so an empty result can mean
//! "nothing registered" or "a dependency failed". The observer is where the
//! difference becomes visible.

use crate::discovery::Endpoint;
use crate::load_balancer::SelectionAlgorithm;
use crate::observability::metrics;

/// Where a suppressed error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    HealthFetch,
    DnsFetch,
    DiscoveryCache,
    MetricsRead,
    MetricsWrite,
    Cursor,
    Selection,
    Refresh,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::HealthFetch => "health_fetch",
            Stage::DnsFetch => "dns_fetch",
            Stage::DiscoveryCache => "discovery_cache",
            Stage::MetricsRead => "metrics_read",
            Stage::MetricsWrite => "metrics_write",
            Stage::Cursor => "cursor",
            Stage::Selection => "selection",
            Stage::Refresh => "refresh",
        }
    }
}

/// Receives every error the resolver degrades instead of returning.
pub trait SelectionObserver: Send + Sync {
    /// An error was swallowed at `stage` while working on `subject`
    /// (a service name or instance id).
    fn on_suppressed(&self, stage: Stage, subject: &str, error: &(dyn std::error::Error + 'static));

    /// A selection call finished. `selected` is `None` for an empty result.
    fn on_selection(
        &self,
        _service: &str,
        _algorithm: SelectionAlgorithm,
        _selected: Option<&Endpoint>,
        _candidates: usize,
    ) {
    }
}

/// Default observer: structured log events plus metrics counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SelectionObserver for TracingObserver {
    fn on_suppressed(&self, stage: Stage, subject: &str, error: &(dyn std::error::Error + 'static)) {
        tracing::warn!(
            stage = stage.as_str(),
            subject = %subject,
            error = %error,
            "Degraded after error"
        );
        metrics::record_suppressed(stage.as_str());
    }

    fn on_selection(
        &self,
        service: &str,
        algorithm: SelectionAlgorithm,
        selected: Option<&Endpoint>,
        candidates: usize,
    ) {
        match selected {
            Some(endpoint) => tracing::debug!(
                service = %service,
                algorithm = %algorithm,
                endpoint = %endpoint,
                candidates,
                "Service instance selected"
            ),
            None => tracing::debug!(
                service = %service,
                algorithm = %algorithm,
                "No service instance selected"
            ),
        }
        metrics::record_selection(service, algorithm.as_str(), selected.is_some());
        metrics::record_candidates(service, candidates);
    }
}
