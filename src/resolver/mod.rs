//! Selection orchestrator.
//!
//! # Data Flow
//! ```text
//! select_optimal_service(name, algorithm)
//!     → HealthProvider + DnsProvider (concurrent, bounded, read-through cache)
//!     → priority tier of SRV records
//!     → no directory match: SRV-only selection over the tier
//!     → otherwise CandidatePool (address match, tier narrowing)
//!     → MetricsStore batch read
//!     → round robin / least connection / weighted draw
//!     → MetricsStore selection stamp
//!     → ServiceSelection { selected, services }
//! ```
//!
//! # Design Decisions
//! - Public operations never fail; every error is handed to the observer
//! - Helpers return `Result`; the collapse to an empty answer happens once
//! - A failed provider degrades to an empty list instead of failing the call

pub mod cache;
pub mod cursor;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::thread_rng;
use serde::Serialize;

use crate::config::{CursorScope, ResolverConfig};
use crate::discovery::{
    DnsProvider, Endpoint, HealthProvider, ProviderError, ServiceInstance, SrvRecord,
};
use crate::load_balancer::pool::{sort_by_priority, top_priority_tier};
use crate::load_balancer::types::SelectionResult;
use crate::load_balancer::{
    combine_health_and_dns_weights, least_connection_selection, least_connection_srv_selection,
    rank_services, round_robin_selection, round_robin_srv_selection, weighted_random_selection,
    weighted_srv_record_selection, CandidatePool, SelectionAlgorithm, ServiceMetrics,
    WeightConfig,
};
use crate::observability::{SelectionObserver, Stage, TracingObserver};
use crate::resilience::bounded;
use crate::store::{KvStore, MetricsStore};

pub use cache::{DiscoveryCache, DiscoveryKind};
pub use cursor::CursorStore;

/// Answer to a selection call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceSelection {
    /// Chosen endpoint; `None` when nothing could be selected.
    pub selected: Option<Endpoint>,
    /// Every endpoint the selection was made from.
    pub services: Vec<Endpoint>,
}

impl ServiceSelection {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Picks instances of named services and feeds back selection telemetry.
pub struct Resolver {
    health: Arc<dyn HealthProvider>,
    dns: Arc<dyn DnsProvider>,
    metrics: MetricsStore,
    discovery: DiscoveryCache,
    cursors: CursorStore,
    weights: WeightConfig,
    default_algorithm: SelectionAlgorithm,
    provider_timeout: Duration,
    observer: Arc<dyn SelectionObserver>,
}

impl Resolver {
    /// Build a resolver that reports through `TracingObserver`.
    pub fn new(
        config: &ResolverConfig,
        health: Arc<dyn HealthProvider>,
        dns: Arc<dyn DnsProvider>,
        store: Arc<dyn KvStore>,
    ) -> Self {
        Self::with_observer(config, health, dns, store, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        config: &ResolverConfig,
        health: Arc<dyn HealthProvider>,
        dns: Arc<dyn DnsProvider>,
        store: Arc<dyn KvStore>,
        observer: Arc<dyn SelectionObserver>,
    ) -> Self {
        let cache = &config.cache;
        let cursors = match config.resolver.cursor_scope {
            CursorScope::Shared if cache.enabled => CursorStore::shared(
                store.clone(),
                cache.prefix.clone(),
                Duration::from_secs(cache.metrics_ttl_secs),
            ),
            _ => CursorStore::local(),
        };

        Self {
            health,
            dns,
            metrics: MetricsStore::new(
                store.clone(),
                cache,
                config.default_metrics.clone(),
                observer.clone(),
            ),
            discovery: DiscoveryCache::new(store, cache, observer.clone()),
            cursors,
            weights: config.weights.clone(),
            default_algorithm: config.resolver.default_algorithm,
            provider_timeout: Duration::from_millis(config.resolver.provider_timeout_ms),
            observer,
        }
    }

    pub fn default_algorithm(&self) -> SelectionAlgorithm {
        self.default_algorithm
    }

    /// Select with the configured default algorithm.
    pub async fn select(&self, service: &str) -> ServiceSelection {
        self.select_optimal_service(service, self.default_algorithm).await
    }

    /// Pick the best instance of `service`. Never fails; an empty answer means
    /// nothing was registered or a dependency failed (see the observer).
    pub async fn select_optimal_service(
        &self,
        service: &str,
        algorithm: SelectionAlgorithm,
    ) -> ServiceSelection {
        let result = match self.try_select(service, algorithm).await {
            Ok(result) => result,
            Err(e) => {
                self.observer.on_suppressed(Stage::Selection, service, &e);
                ServiceSelection::empty()
            }
        };
        self.observer.on_selection(
            service,
            algorithm,
            result.selected.as_ref(),
            result.services.len(),
        );
        result
    }

    async fn try_select(
        &self,
        service: &str,
        algorithm: SelectionAlgorithm,
    ) -> SelectionResult<ServiceSelection> {
        let (instances, mut records) =
            tokio::join!(self.fetch_instances(service), self.fetch_records(service));

        if instances.is_empty() && records.is_empty() {
            return Ok(ServiceSelection::empty());
        }

        sort_by_priority(&mut records);
        let tier = top_priority_tier(&records);

        let pool = match CandidatePool::reconcile(&instances, &records, &tier) {
            Some(pool) => pool,
            None => {
                if !instances.is_empty() {
                    tracing::debug!(
                        service = %service,
                        instances = instances.len(),
                        records = records.len(),
                        "No directory instance matches DNS, selecting from SRV records"
                    );
                }
                return Ok(self.select_from_srv(service, &tier, algorithm).await);
            }
        };

        let ids: Vec<String> = pool.candidates.iter().map(|i| i.id.clone()).collect();
        let metrics = self.metrics.get_services_metrics(&ids).await;

        let chosen = match algorithm {
            SelectionAlgorithm::RoundRobin => {
                let cursor = self.load_cursor(service).await;
                let selection = round_robin_selection(&pool.candidates, cursor)?;
                let chosen = selection.selected.clone();
                self.store_cursor(service, selection.next_cursor).await;
                chosen
            }
            SelectionAlgorithm::LeastConnection => {
                least_connection_selection(&pool.candidates, &metrics, self.metrics.defaults())?
                    .clone()
            }
            SelectionAlgorithm::WeightedRoundRobin => self.weighted_pick(&pool, &metrics)?,
        };

        self.stamp_selection(&chosen.id).await;

        Ok(ServiceSelection {
            selected: Some(pool.endpoint_for(&chosen)),
            services: pool.matched_endpoints(),
        })
    }

    /// Telemetry ranking boosted by DNS weight, then a roulette draw.
    fn weighted_pick(
        &self,
        pool: &CandidatePool,
        metrics: &HashMap<String, ServiceMetrics>,
    ) -> SelectionResult<ServiceInstance> {
        let mut ranked = rank_services(&pool.candidates, metrics, &self.weights)?;
        for candidate in &mut ranked {
            let dns_weight = pool.dns_weight(&candidate.instance);
            candidate.score *= 1.0 + dns_weight / pool.max_dns_weight;
            tracing::trace!(
                id = %candidate.id,
                score = candidate.score,
                health_dns_blend =
                    combine_health_and_dns_weights(&candidate.instance, dns_weight, pool.max_dns_weight),
                "Ranked candidate"
            );
        }

        let mut rng = thread_rng();
        Ok(weighted_random_selection(&ranked, &mut rng)?.instance.clone())
    }

    /// Selection straight from the preferred SRV tier.
    async fn select_from_srv(
        &self,
        service: &str,
        tier: &[SrvRecord],
        algorithm: SelectionAlgorithm,
    ) -> ServiceSelection {
        let chosen: Option<SrvRecord> = match algorithm {
            SelectionAlgorithm::RoundRobin => {
                let cursor = self.load_cursor(service).await;
                match round_robin_srv_selection(tier, cursor) {
                    Some(selection) => {
                        let chosen = selection.selected.clone();
                        self.store_cursor(service, selection.next_cursor).await;
                        Some(chosen)
                    }
                    None => None,
                }
            }
            SelectionAlgorithm::WeightedRoundRobin => {
                let cursor = self.load_cursor(service).await;
                let drawn = {
                    let mut rng = thread_rng();
                    weighted_srv_record_selection(tier, cursor, &mut rng)
                        .map(|s| (s.selected.clone(), s.next_cursor))
                };
                match drawn {
                    Some((chosen, next_cursor)) => {
                        if next_cursor != cursor {
                            self.store_cursor(service, next_cursor).await;
                        }
                        Some(chosen)
                    }
                    None => None,
                }
            }
            SelectionAlgorithm::LeastConnection => {
                let names: Vec<String> = tier.iter().map(|r| r.name.clone()).collect();
                let metrics = self.metrics.get_services_metrics(&names).await;
                least_connection_srv_selection(tier, &metrics, self.metrics.defaults()).cloned()
            }
        };

        match chosen {
            Some(record) => {
                self.stamp_selection(&record.name).await;
                ServiceSelection {
                    selected: Some(Endpoint::from(&record)),
                    services: tier.iter().map(Endpoint::from).collect(),
                }
            }
            None => ServiceSelection::empty(),
        }
    }

    async fn fetch_instances(&self, service: &str) -> Vec<ServiceInstance> {
        let live = bounded(
            self.provider_timeout,
            self.health.get_health_checks(service),
            ProviderError::Timeout,
        );
        match self
            .discovery
            .read_through(DiscoveryKind::Health, service, live)
            .await
        {
            Ok(instances) => instances,
            Err(e) => {
                self.observer.on_suppressed(Stage::HealthFetch, service, &e);
                Vec::new()
            }
        }
    }

    async fn fetch_records(&self, service: &str) -> Vec<SrvRecord> {
        let live = bounded(
            self.provider_timeout,
            self.dns.resolve_dns(service),
            ProviderError::Timeout,
        );
        match self
            .discovery
            .read_through(DiscoveryKind::Dns, service, live)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                self.observer.on_suppressed(Stage::DnsFetch, service, &e);
                Vec::new()
            }
        }
    }

    async fn load_cursor(&self, service: &str) -> usize {
        self.cursors.load(service).await.unwrap_or_else(|e| {
            self.observer.on_suppressed(Stage::Cursor, service, &e);
            0
        })
    }

    async fn store_cursor(&self, service: &str, cursor: usize) {
        if let Err(e) = self.cursors.store(service, cursor).await {
            self.observer.on_suppressed(Stage::Cursor, service, &e);
        }
    }

    async fn stamp_selection(&self, id: &str) {
        if let Err(e) = self.metrics.update_selection_metrics(id).await {
            self.observer.on_suppressed(Stage::MetricsWrite, id, &e);
        }
    }

    /// Record a new connection to instance `id`.
    pub async fn increment_connections(&self, id: &str) {
        if let Err(e) = self.metrics.increment_connections(id).await {
            self.observer.on_suppressed(Stage::MetricsWrite, id, &e);
        }
    }

    /// Record a closed connection to instance `id`. Never goes below zero.
    pub async fn decrement_connections(&self, id: &str) {
        if let Err(e) = self.metrics.decrement_connections(id).await {
            self.observer.on_suppressed(Stage::MetricsWrite, id, &e);
        }
    }

    /// Stored metrics for `id`, or `None` on miss or store error.
    pub async fn get_selection_metrics(&self, id: &str) -> Option<ServiceMetrics> {
        self.metrics.get_selection_metrics(id).await
    }

    /// Clear every key under the cache prefix and forget local cursors.
    /// Returns the number of keys removed.
    pub async fn refresh(&self) -> usize {
        self.cursors.clear_local();
        match self.metrics.refresh().await {
            Ok(removed) => removed,
            Err(e) => {
                self.observer.on_suppressed(Stage::Refresh, "*", &e);
                0
            }
        }
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("metrics", &self.metrics)
            .field("discovery", &self.discovery)
            .field("cursors", &self.cursors)
            .field("default_algorithm", &self.default_algorithm)
            .field("provider_timeout", &self.provider_timeout)
            .finish()
    }
}
