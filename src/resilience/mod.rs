//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Provider or cache call:
//!     → timeouts.rs (enforce deadline)
//!     → On timeout: caller degrades (empty list, live fetch, defaults)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries here; a failed call degrades for this selection only

pub mod timeouts;

pub use timeouts::bounded;
