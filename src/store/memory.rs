//! In-process TTL key-value store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::{KvStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// A thread-safe store with per-key expiry.
///
/// Expired entries are dropped lazily when touched or listed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.inner.len())
    }

    fn live(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        // Read guard must be released before removing from the same shard.
        let hit = self
            .inner
            .get(key)
            .map(|e| (e.value.clone(), e.is_expired(now)));
        match hit {
            Some((value, false)) => Some(value),
            Some((_, true)) => {
                self.inner.remove_if(key, |_, e| e.is_expired(now));
                None
            }
            None => None,
        }
    }
}

/// Glob match where `*` is the only wildcard.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let middle: Vec<&str> = parts.collect();
    let Some((last, middle)) = middle.split_last() else {
        // No wildcard at all: exact match.
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner
            .insert(key.to_string(), Entry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        Ok(keys.iter().map(|k| self.live(k)).collect())
    }

    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entry = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Entry::new("0".to_string(), ttl));

        let current = if entry.is_expired(now) {
            0
        } else {
            entry
                .value
                .parse::<i64>()
                .map_err(|_| StoreError::NotAnInteger(key.to_string()))?
        };
        let updated = current.saturating_add(delta);
        *entry = Entry::new(updated.to_string(), ttl);
        Ok(updated)
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.purge_expired();
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .inner
            .iter()
            .filter(|e| !e.is_expired(now) && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn del(&self, keys: &[String]) -> StoreResult<usize> {
        let now = Instant::now();
        let removed = keys
            .iter()
            .filter_map(|k| self.inner.remove(k))
            .filter(|(_, e)| !e.is_expired(now))
            .count();
        Ok(removed)
    }
}
