//! Read-through cache in front of the discovery providers.
//!
//! # Responsibilities
//! - Serve `{prefix}:health:{service}` and `{prefix}:dns:{service}` when fresh
//! - Race the lookup against a short deadline and fall through to the live call
//! - Store successful non-empty provider answers with the discovery TTL
//!
//! # Design Decisions
//! - Cache problems never fail a lookup; they are reported and skipped
//! - Provider errors are never cached
//! - Empty answers are not cached so new registrations show up immediately

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::discovery::ProviderResult;
use crate::observability::{metrics, SelectionObserver, Stage};
use crate::resilience::bounded;
use crate::store::{KvStore, StoreError};

/// Which provider answer a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    Health,
    Dns,
}

impl DiscoveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryKind::Health => "health",
            DiscoveryKind::Dns => "dns",
        }
    }
}

pub struct DiscoveryCache {
    store: Arc<dyn KvStore>,
    enabled: bool,
    prefix: String,
    ttl: Duration,
    lookup_timeout: Duration,
    observer: Arc<dyn SelectionObserver>,
}

impl DiscoveryCache {
    pub fn new(
        store: Arc<dyn KvStore>,
        config: &CacheConfig,
        observer: Arc<dyn SelectionObserver>,
    ) -> Self {
        Self {
            store,
            enabled: config.enabled,
            prefix: config.prefix.clone(),
            ttl: Duration::from_secs(config.discovery_ttl_secs),
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms),
            observer,
        }
    }

    pub fn key(&self, kind: DiscoveryKind, service: &str) -> String {
        format!("{}:{}:{}", self.prefix, kind.as_str(), service)
    }

    /// Cached answer if fresh, otherwise `fetch` (and remember its answer).
    pub async fn read_through<T, F>(
        &self,
        kind: DiscoveryKind,
        service: &str,
        fetch: F,
    ) -> ProviderResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = ProviderResult<Vec<T>>>,
    {
        if !self.enabled {
            return fetch.await;
        }

        let key = self.key(kind, service);
        if let Some(cached) = self.lookup(kind, service, &key).await {
            return Ok(cached);
        }

        let fresh = fetch.await?;
        if !fresh.is_empty() {
            self.remember(service, &key, &fresh).await;
        }
        Ok(fresh)
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        kind: DiscoveryKind,
        service: &str,
        key: &str,
    ) -> Option<Vec<T>> {
        let raw = match bounded(self.lookup_timeout, self.store.get(key), StoreError::Timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                self.observer.on_suppressed(Stage::DiscoveryCache, service, &e);
                None
            }
        };

        let decoded = raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.observer
                    .on_suppressed(Stage::DiscoveryCache, service, &StoreError::Serialization(e));
                None
            }
        });

        metrics::record_cache_lookup(kind.as_str(), decoded.is_some());
        decoded
    }

    async fn remember<T: Serialize>(&self, service: &str, key: &str, value: &[T]) {
        let written = match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, &raw, self.ttl).await,
            Err(e) => Err(StoreError::Serialization(e)),
        };
        if let Err(e) = written {
            self.observer.on_suppressed(Stage::DiscoveryCache, service, &e);
        }
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("enabled", &self.enabled)
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("lookup_timeout", &self.lookup_timeout)
            .finish()
    }
}
