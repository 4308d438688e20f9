//! Selection and scoring subsystem.
//!
//! # Data Flow
//! ```text
//! Directory instances + SRV records
//!     → pool.rs (priority tier, address match, narrowing)
//!     → Apply selection algorithm:
//!         - round_robin.rs (rotate through healthy instances)
//!         - least_conn.rs (pick instance with fewest connections)
//!         - scoring.rs + weighted.rs (rank by telemetry, roulette draw)
//!         - srv.rs (SRV-only fallback when the directory has no match)
//!     → Selected instance + next cursor
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless functions; the cursor is passed in and returned
//! - Unhealthy instances excluded from round robin and least connections
//! - Weighted selection ranks every candidate; health is part of the score
//! - Helpers fail with `SelectionError`; callers decide how to degrade

pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod scoring;
pub mod srv;
pub mod types;
pub mod weighted;

pub use least_conn::least_connection_selection;
pub use pool::CandidatePool;
pub use round_robin::round_robin_selection;
pub use scoring::{
    calculate_distribution_score, calculate_health_score, calculate_resource_score,
    combine_health_and_dns_weights, normalize_score, rank_services,
};
pub use srv::{
    least_connection_srv_selection, round_robin_srv_selection, weighted_srv_record_selection,
};
pub use types::{
    RankedCandidate, Selection, SelectionAlgorithm, SelectionError, ServiceMetrics, WeightConfig,
};
pub use weighted::weighted_random_selection;
