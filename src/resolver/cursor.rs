//! Round-robin cursor storage.
//!
//! One cursor per service name. Loads and stores are separate calls, so two
//! concurrent selections for the same service may read the same value; the
//! later store wins. Round robin stays a soft balancing heuristic either way.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::store::{KvStore, StoreError, StoreResult};

/// Where cursors are kept.
pub enum CursorStore {
    /// Process-local map.
    Local(DashMap<String, usize>),
    /// `{prefix}:cursor:{service}` in the key-value store.
    Shared {
        store: Arc<dyn KvStore>,
        prefix: String,
        ttl: Duration,
    },
}

impl CursorStore {
    pub fn local() -> Self {
        CursorStore::Local(DashMap::new())
    }

    pub fn shared(store: Arc<dyn KvStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        CursorStore::Shared {
            store,
            prefix: prefix.into(),
            ttl,
        }
    }

    fn key(prefix: &str, service: &str) -> String {
        format!("{}:cursor:{}", prefix, service)
    }

    /// Current cursor for `service`; 0 when none has been stored.
    pub async fn load(&self, service: &str) -> StoreResult<usize> {
        match self {
            CursorStore::Local(map) => Ok(map.get(service).map(|c| *c).unwrap_or(0)),
            CursorStore::Shared { store, prefix, .. } => {
                let key = Self::key(prefix, service);
                match store.get(&key).await? {
                    Some(raw) => raw.parse().map_err(|_| StoreError::NotAnInteger(key)),
                    None => Ok(0),
                }
            }
        }
    }

    pub async fn store(&self, service: &str, cursor: usize) -> StoreResult<()> {
        match self {
            CursorStore::Local(map) => {
                map.insert(service.to_string(), cursor);
                Ok(())
            }
            CursorStore::Shared { store, prefix, ttl } => {
                store
                    .set(&Self::key(prefix, service), &cursor.to_string(), *ttl)
                    .await
            }
        }
    }

    /// Forget every process-local cursor. Shared cursors live under the cache
    /// prefix and are cleared with it.
    pub fn clear_local(&self) {
        if let CursorStore::Local(map) = self {
            map.clear();
        }
    }
}

impl std::fmt::Debug for CursorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorStore::Local(map) => f.debug_tuple("Local").field(&map.len()).finish(),
            CursorStore::Shared { prefix, ttl, .. } => f
                .debug_struct("Shared")
                .field("prefix", prefix)
                .field("ttl", ttl)
                .finish(),
        }
    }
}
