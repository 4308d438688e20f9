//! Metrics cache subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver
//!     → metrics.rs (MetricsStore: key scheme, defaults, fail-soft reads)
//!     → KvStore trait (get / set / get_many / incr_by / keys / del)
//!     → memory.rs (in-process TTL store) or any external store
//! ```
//!
//! # Key Layout
//! ```text
//! {prefix}:connections:{id}   JSON ServiceMetrics, sliding TTL
//! {prefix}:conn_count:{id}    integer counter (atomic counter mode only)
//! {prefix}:cursor:{service}   round-robin cursor (shared cursor scope only)
//! {prefix}:health:{service}   read-through directory cache
//! {prefix}:dns:{service}      read-through DNS cache
//! ```
//!
//! # Design Decisions
//! - Records are created lazily on first write and expire through TTL only
//! - Read-modify-write is not atomic in embedded counter mode
//! - A disabled cache behaves exactly like an always-empty store

pub mod memory;
pub mod metrics;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use metrics::MetricsStore;

/// Errors raised by key-value stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable or refused the command.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored value is not what the caller expected.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Counter command against a non-integer value.
    #[error("Value at {0} is not an integer")]
    NotAnInteger(String),

    /// Store did not answer within the deadline.
    #[error("Store timeout after {0:?}")]
    Timeout(Duration),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// External TTL key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` and reset the key's expiry to `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Pipelined read; one slot per key, in order.
    async fn get_many(&self, keys: &[String]) -> StoreResult<Vec<Option<String>>>;

    /// Atomically add `delta` to an integer key (missing counts as 0) and reset its expiry.
    async fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> StoreResult<i64>;

    /// Keys matching a glob pattern where `*` matches any run of characters.
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> StoreResult<usize>;
}
