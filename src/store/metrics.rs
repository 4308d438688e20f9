//! Per-instance telemetry records on top of a `KvStore`.
//!
//! # Responsibilities
//! - Own the `{prefix}:connections:{id}` key scheme and JSON schema
//! - Adjust connection counts with a floor of zero
//! - Stamp the last selection time after a completed selection
//! - Batch-read metrics for a candidate set, defaulting on miss or error
//!
//! # Design Decisions
//! - Writes always reset the full TTL (sliding expiry)
//! - Batch reads never fail; problems go to the observer and become defaults
//! - Mutations return `StoreResult` so the resolver decides how to degrade

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CounterMode};
use crate::load_balancer::types::{epoch_millis, ServiceMetrics};
use crate::observability::{SelectionObserver, Stage};
use crate::store::{KvStore, StoreError, StoreResult};

/// Metrics cache for service instances.
pub struct MetricsStore {
    store: Arc<dyn KvStore>,
    enabled: bool,
    prefix: String,
    ttl: Duration,
    counter_mode: CounterMode,
    defaults: ServiceMetrics,
    observer: Arc<dyn SelectionObserver>,
}

impl MetricsStore {
    pub fn new(
        store: Arc<dyn KvStore>,
        config: &CacheConfig,
        defaults: ServiceMetrics,
        observer: Arc<dyn SelectionObserver>,
    ) -> Self {
        Self {
            store,
            enabled: config.enabled,
            prefix: config.prefix.clone(),
            ttl: Duration::from_secs(config.metrics_ttl_secs),
            counter_mode: config.counter_mode,
            defaults,
            observer,
        }
    }

    /// Metrics assumed for instances without a record.
    pub fn defaults(&self) -> &ServiceMetrics {
        &self.defaults
    }

    pub fn metrics_key(&self, id: &str) -> String {
        format!("{}:connections:{}", self.prefix, id)
    }

    pub fn counter_key(&self, id: &str) -> String {
        format!("{}:conn_count:{}", self.prefix, id)
    }

    fn atomic_counters(&self) -> bool {
        self.counter_mode == CounterMode::Atomic
    }

    /// Parse a stored blob, reporting and defaulting a corrupt one.
    fn decode(&self, id: &str, raw: &str) -> ServiceMetrics {
        match serde_json::from_str(raw) {
            Ok(metrics) => metrics,
            Err(e) => {
                self.observer
                    .on_suppressed(Stage::MetricsRead, id, &StoreError::Serialization(e));
                self.defaults.clone()
            }
        }
    }

    /// Overlay a separately stored counter onto `metrics`.
    fn overlay_counter(&self, id: &str, metrics: &mut ServiceMetrics, raw: &str) {
        match raw.parse::<i64>() {
            Ok(count) => metrics.active_connections = count.max(0) as u64,
            Err(_) => self.observer.on_suppressed(
                Stage::MetricsRead,
                id,
                &StoreError::NotAnInteger(self.counter_key(id)),
            ),
        }
    }

    async fn read_or_default(&self, id: &str) -> StoreResult<ServiceMetrics> {
        if !self.enabled {
            return Ok(self.defaults.clone());
        }
        Ok(match self.store.get(&self.metrics_key(id)).await? {
            Some(raw) => self.decode(id, &raw),
            None => self.defaults.clone(),
        })
    }

    async fn write(&self, id: &str, metrics: &ServiceMetrics) -> StoreResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let value = serde_json::to_string(metrics)?;
        self.store.set(&self.metrics_key(id), &value, self.ttl).await
    }

    async fn adjust_connections(&self, id: &str, delta: i64) -> StoreResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let count = match self.counter_mode {
            CounterMode::Embedded => {
                let mut metrics = self.read_or_default(id).await?;
                metrics.active_connections = if delta >= 0 {
                    metrics.active_connections.saturating_add(delta.unsigned_abs())
                } else {
                    metrics.active_connections.saturating_sub(delta.unsigned_abs())
                };
                self.write(id, &metrics).await?;
                metrics.active_connections
            }
            CounterMode::Atomic => {
                let key = self.counter_key(id);
                let count = self.store.incr_by(&key, delta, self.ttl).await?;
                if count < 0 {
                    self.store.set(&key, "0", self.ttl).await?;
                }
                count.max(0) as u64
            }
        };

        tracing::debug!(id = %id, delta, active_connections = count, "Connection count updated");
        Ok(())
    }

    pub async fn increment_connections(&self, id: &str) -> StoreResult<()> {
        self.adjust_connections(id, 1).await
    }

    /// Decrement, never going below zero.
    pub async fn decrement_connections(&self, id: &str) -> StoreResult<()> {
        self.adjust_connections(id, -1).await
    }

    /// Stamp `lastSelectedTime = now`, preserving every other field.
    pub async fn update_selection_metrics(&self, id: &str) -> StoreResult<()> {
        let mut metrics = self.read_or_default(id).await?;
        metrics.last_selected_time = Some(epoch_millis());
        self.write(id, &metrics).await
    }

    /// Metrics for every id in one round trip. Never fails.
    pub async fn get_services_metrics(&self, ids: &[String]) -> HashMap<String, ServiceMetrics> {
        let mut result: HashMap<String, ServiceMetrics> = ids
            .iter()
            .map(|id| (id.clone(), self.defaults.clone()))
            .collect();
        if !self.enabled || ids.is_empty() {
            return result;
        }

        let atomic = self.atomic_counters();
        let mut keys: Vec<String> = ids.iter().map(|id| self.metrics_key(id)).collect();
        if atomic {
            keys.extend(ids.iter().map(|id| self.counter_key(id)));
        }

        let values = match self.store.get_many(&keys).await {
            Ok(values) if values.len() == keys.len() => values,
            Ok(values) => {
                let err = StoreError::Unavailable(format!(
                    "batch returned {} values for {} keys",
                    values.len(),
                    keys.len()
                ));
                self.observer.on_suppressed(Stage::MetricsRead, &self.prefix, &err);
                return result;
            }
            Err(e) => {
                self.observer.on_suppressed(Stage::MetricsRead, &self.prefix, &e);
                return result;
            }
        };

        let (blobs, counters) = values.split_at(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let mut metrics = match &blobs[i] {
                Some(raw) => self.decode(id, raw),
                None => self.defaults.clone(),
            };
            if atomic {
                if let Some(raw) = &counters[i] {
                    self.overlay_counter(id, &mut metrics, raw);
                }
            }
            result.insert(id.clone(), metrics);
        }
        result
    }

    /// Stored metrics for one id; `None` on miss or any store error.
    pub async fn get_selection_metrics(&self, id: &str) -> Option<ServiceMetrics> {
        if !self.enabled {
            return None;
        }

        let lookup = if self.atomic_counters() {
            self.store
                .get_many(&[self.metrics_key(id), self.counter_key(id)])
                .await
        } else {
            self.store.get(&self.metrics_key(id)).await.map(|v| vec![v])
        };
        let values = match lookup {
            Ok(values) => values,
            Err(e) => {
                self.observer.on_suppressed(Stage::MetricsRead, id, &e);
                return None;
            }
        };

        let blob = values.first().cloned().flatten();
        let counter = values.get(1).cloned().flatten();
        if blob.is_none() && counter.is_none() {
            return None;
        }

        let mut metrics = match blob {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(metrics) => metrics,
                Err(e) => {
                    self.observer
                        .on_suppressed(Stage::MetricsRead, id, &StoreError::Serialization(e));
                    return None;
                }
            },
            None => self.defaults.clone(),
        };
        if let Some(raw) = counter {
            self.overlay_counter(id, &mut metrics, &raw);
        }
        Some(metrics)
    }

    /// Delete every key under the prefix, returning how many were removed.
    pub async fn refresh(&self) -> StoreResult<usize> {
        if !self.enabled {
            return Ok(0);
        }
        let keys = self.store.keys(&format!("{}:*", self.prefix)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self.store.del(&keys).await?;
        tracing::info!(prefix = %self.prefix, removed, "Cache refreshed");
        Ok(removed)
    }
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore")
            .field("enabled", &self.enabled)
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("counter_mode", &self.counter_mode)
            .finish()
    }
}
