//! Selection over raw SRV records.
//!
//! Used when the directory has nothing to say about a service (or disagrees
//! with DNS entirely). Records carry no health data, so every record in the
//! tier is eligible.
//!
//! # Zero weights
//! A zero-weight record is only drawn when the whole tier is zero-weight, in
//! which case the tier is served round robin. While any record in the tier
//! has a positive weight, zero-weight records receive no traffic.

use std::collections::HashMap;

use rand::Rng;

use crate::discovery::SrvRecord;
use crate::load_balancer::types::{Selection, ServiceMetrics};

/// Round robin over records; `None` for an empty list.
pub fn round_robin_srv_selection(
    records: &[SrvRecord],
    cursor: usize,
) -> Option<Selection<&SrvRecord>> {
    if records.is_empty() {
        return None;
    }
    let index = cursor % records.len();
    Some(Selection {
        selected: &records[index],
        next_cursor: (index + 1) % records.len(),
    })
}

/// Weight-proportional draw over records, falling back to round robin when
/// every weight is zero. The cursor only advances on the fallback path.
pub fn weighted_srv_record_selection<'a, R: Rng>(
    records: &'a [SrvRecord],
    cursor: usize,
    rng: &mut R,
) -> Option<Selection<&'a SrvRecord>> {
    let total: u32 = records.iter().map(|r| u32::from(r.weight)).sum();
    if total == 0 {
        return round_robin_srv_selection(records, cursor);
    }

    let mut point = rng.gen_range(0..total);
    for record in records {
        let weight = u32::from(record.weight);
        if point < weight {
            return Some(Selection {
                selected: record,
                next_cursor: cursor,
            });
        }
        point -= weight;
    }
    None
}

/// Record with the fewest active connections, keyed by record name.
pub fn least_connection_srv_selection<'a>(
    records: &'a [SrvRecord],
    metrics_by_name: &HashMap<String, ServiceMetrics>,
    default_metrics: &ServiceMetrics,
) -> Option<&'a SrvRecord> {
    records.iter().min_by_key(|r| {
        metrics_by_name
            .get(&r.name)
            .unwrap_or(default_metrics)
            .active_connections
    })
}
