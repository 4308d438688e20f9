//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!     → hook.rs (SelectionObserver: outcomes and swallowed errors)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Custom observers injected into the resolver
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Errors degraded to defaults always pass through the observer
//! - Metrics are cheap and no-ops without a recorder

pub mod hook;
pub mod logging;
pub mod metrics;

pub use hook::{SelectionObserver, Stage, TracingObserver};
