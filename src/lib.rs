//! Service instance resolver.
//!
//! Picks the best instance of a named service from directory registrations
//! and DNS SRV records, using live telemetry kept in a TTL key-value store.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────┐
//!                       │                      RESOLVER                         │
//!                       │                                                       │
//!   select(name) ───────┼─▶┌───────────┐   ┌────────────┐   ┌───────────────┐  │
//!                       │  │ discovery │──▶│ candidate  │──▶│ load_balancer │  │
//!                       │  │health+dns │   │   pool     │   │ rr / lc / wrr │  │
//!                       │  └─────┬─────┘   └────────────┘   └───────┬───────┘  │
//!                       │        │ read-through                     │          │
//!                       │        ▼                                  ▼          │
//!                       │  ┌──────────────────────────────────────────────┐    │
//!   { selected, ◀───────┼──│       store (MetricsStore over KvStore)      │    │
//!     services }        │  │  metrics blobs / counters / cursors / cache  │    │
//!                       │  └──────────────────────────────────────────────┘    │
//!                       │                                                       │
//!                       │  ┌──────────────────────────────────────────────┐    │
//!                       │  │            Cross-Cutting Concerns             │    │
//!                       │  │  ┌────────┐ ┌───────────────┐ ┌────────────┐ │    │
//!                       │  │  │ config │ │ observability │ │ resilience │ │    │
//!                       │  │  │+reload │ │ logs/metrics  │ │  timeouts  │ │    │
//!                       │  │  └────────┘ └───────────────┘ └────────────┘ │    │
//!                       │  └──────────────────────────────────────────────┘    │
//!                       └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod discovery;
pub mod load_balancer;
pub mod resolver;
pub mod store;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod resilience;

pub use config::ResolverConfig;
pub use discovery::{DnsProvider, Endpoint, HealthProvider};
pub use load_balancer::{SelectionAlgorithm, ServiceMetrics};
pub use resolver::{Resolver, ServiceSelection};
pub use store::{KvStore, MemoryStore};
